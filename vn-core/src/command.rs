//! # Command 模块
//!
//! 定义场景脚本中的命令及其附属结构（选项、条件分支）。
//!
//! ## 设计说明
//!
//! - 每条命令都有稳定的 `id`（编辑器用于折叠状态与拖拽排序）
//! - 解释器**只按索引**寻址命令，`id` 不参与执行
//! - JSON 采用扁平结构，`type` 字段区分命令种类

use serde::{Deserialize, Serialize};

/// 脚本命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// 稳定标识（与位置无关）
    pub id: String,
    /// 命令内容
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl Command {
    /// 创建命令
    pub fn new(id: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// 创建线性对话（无选项）
    pub fn dialogue(id: impl Into<String>, speaker: &str, text: &str) -> Self {
        Self::new(
            id,
            CommandKind::Dialogue {
                speaker: speaker.to_string(),
                text: text.to_string(),
                choices: Vec::new(),
            },
        )
    }

    /// 创建带选项的对话
    pub fn choice_dialogue(
        id: impl Into<String>,
        speaker: &str,
        text: &str,
        choices: Vec<Choice>,
    ) -> Self {
        Self::new(
            id,
            CommandKind::Dialogue {
                speaker: speaker.to_string(),
                text: text.to_string(),
                choices,
            },
        )
    }

    /// 是否会使解释器暂停
    pub fn causes_wait(&self) -> bool {
        matches!(self.kind, CommandKind::Dialogue { .. })
    }

    /// 如果是对话命令，返回其选项
    pub fn choices(&self) -> Option<&[Choice]> {
        match &self.kind {
            CommandKind::Dialogue { choices, .. } => Some(choices),
            _ => None,
        }
    }
}

/// 命令种类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommandKind {
    /// 对话（可带选项）
    Dialogue {
        /// 说话者（空字符串表示旁白）
        #[serde(default)]
        speaker: String,
        /// 对话文本
        #[serde(default)]
        text: String,
        /// 选项列表，为空表示线性对话
        #[serde(default)]
        choices: Vec<Choice>,
    },

    /// 条件分支
    Branching {
        /// 编辑器显示用标签
        #[serde(default)]
        label: String,
        /// 有序条件列表：if, elseif*, else?
        #[serde(default)]
        conditions: Vec<ConditionBranch>,
    },

    /// 设置标志
    SetFlag { flag_name: String, value: bool },

    /// 修改变量
    SetVariable {
        variable_name: String,
        operation: VariableOp,
        value: i64,
    },

    /// 调用共享命令组（内联展开）
    CallSharedCommand { shared_command_id: String },

    /// 跳转到场景
    Goto {
        target_scene: usize,
        #[serde(default)]
        use_transition: bool,
    },

    /// 播放 BGM
    #[serde(rename = "playBGM")]
    PlayBgm(AudioParams),

    /// 停止 BGM
    #[serde(rename = "stopBGM")]
    StopBgm,

    /// BGM 音量渐变
    #[serde(rename = "fadeBGM")]
    FadeBgm(FadeParams),

    /// 播放环境音
    #[serde(rename = "playBGS")]
    PlayBgs(AudioParams),

    /// 停止环境音
    #[serde(rename = "stopBGS")]
    StopBgs,

    /// 环境音音量渐变
    #[serde(rename = "fadeBGS")]
    FadeBgs(FadeParams),

    /// 播放一次性音效
    #[serde(rename = "playSFX")]
    PlaySfx(SfxParams),

    /// 显示角色
    ShowCharacter {
        #[serde(default)]
        fade_ms: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        animation: Option<FrameAnimation>,
    },

    /// 隐藏角色
    HideCharacter {
        #[serde(default)]
        fade_ms: u32,
    },

    /// 显示背景
    ShowBackground {
        #[serde(default)]
        fade_ms: u32,
    },

    /// 隐藏背景
    HideBackground {
        #[serde(default)]
        fade_ms: u32,
    },
}

/// 变量操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableOp {
    /// 直接赋值
    Set,
    /// 加法（上限 255）
    Add,
    /// 减法（下限 0）
    Subtract,
}

impl VariableOp {
    /// 对当前值应用操作，结果钳制在 [0, 255]
    ///
    /// 钳制是领域规则，绝不回绕。
    pub fn apply(self, current: u8, operand: i64) -> u8 {
        let current = i64::from(current);
        let result = match self {
            Self::Set => operand,
            Self::Add => current.saturating_add(operand),
            Self::Subtract => current.saturating_sub(operand),
        };
        result.clamp(0, i64::from(u8::MAX)) as u8
    }
}

/// 音频播放参数（BGM / BGS）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParams {
    /// 音频资源句柄
    pub source: String,
    /// 音量 0-100
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// 音高 50-200（百分比）
    #[serde(default = "default_pitch")]
    pub pitch: u16,
}

/// 音效参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfxParams {
    pub source: String,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default = "default_pitch")]
    pub pitch: u16,
    /// 声像 -100（左）..100（右）
    #[serde(default)]
    pub pan: i16,
}

/// 音量渐变参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeParams {
    /// 目标音量 0-100
    pub target_volume: u8,
    /// 渐变时长（毫秒）
    pub duration_ms: u32,
}

fn default_volume() -> u8 {
    100
}

fn default_pitch() -> u16 {
    100
}

/// 角色帧动画参数
///
/// 角色图片被视为横向排列的精灵表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnimation {
    /// 帧数
    pub frame_count: u32,
    /// 单帧宽度（像素）
    pub frame_width: u32,
    /// 每帧时长（毫秒）
    pub frame_duration_ms: u32,
    /// 是否循环
    #[serde(default = "default_looping")]
    pub looping: bool,
}

fn default_looping() -> bool {
    true
}

impl FrameAnimation {
    /// 根据经过的时间计算当前帧
    pub fn frame_at(&self, elapsed_ms: u64) -> u32 {
        if self.frame_count == 0 || self.frame_duration_ms == 0 {
            return 0;
        }
        let step = elapsed_ms / u64::from(self.frame_duration_ms);
        if self.looping {
            (step % u64::from(self.frame_count)) as u32
        } else {
            step.min(u64::from(self.frame_count - 1)) as u32
        }
    }
}

/// 对话选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    /// 选项文本
    pub text: String,
    /// 是否启用跳转
    #[serde(default)]
    pub enable_goto: bool,
    /// 跳转目标场景索引
    #[serde(default)]
    pub goto: usize,
    /// 选择时设置的标志名（空字符串表示不设置）
    #[serde(default)]
    pub set_flag: String,
    /// 设置的标志值
    #[serde(default)]
    pub set_flag_value: bool,
}

impl Choice {
    /// 创建只推进的选项
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enable_goto: false,
            goto: 0,
            set_flag: String::new(),
            set_flag_value: false,
        }
    }

    /// 设置跳转目标
    pub fn with_goto(mut self, scene_index: usize) -> Self {
        self.enable_goto = true;
        self.goto = scene_index;
        self
    }

    /// 设置选择时写入的标志
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.set_flag = name.into();
        self.set_flag_value = value;
        self
    }

    /// 选择时要写入的标志（如果有）
    pub fn flag_effect(&self) -> Option<(&str, bool)> {
        if self.set_flag.is_empty() {
            None
        } else {
            Some((self.set_flag.as_str(), self.set_flag_value))
        }
    }
}

/// 分支类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    If,
    #[serde(rename = "elseif")]
    ElseIf,
    Else,
}

/// 条件检查对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    #[default]
    Flag,
    Variable,
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterEq,
    #[serde(rename = "<=")]
    LessEq,
}

impl Operator {
    /// 运算符的脚本写法
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterEq => ">=",
            Self::LessEq => "<=",
        }
    }

    /// 是否可用于标志比较
    pub fn applies_to_flags(self) -> bool {
        matches!(self, Self::Eq | Self::NotEq)
    }
}

/// 条件比较值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompareValue {
    Bool(bool),
    Int(i64),
}

impl Default for CompareValue {
    fn default() -> Self {
        Self::Bool(true)
    }
}

/// 条件分支的一项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionBranch {
    /// if / elseif / else
    #[serde(rename = "type")]
    pub kind: BranchKind,
    #[serde(default)]
    pub check_type: CheckType,
    /// 检查的标志名（check_type = flag）
    #[serde(default)]
    pub flag_name: String,
    /// 检查的变量名（check_type = variable）
    #[serde(default)]
    pub variable_name: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub compare_value: CompareValue,
    /// 分支体，本身是完整的命令列表
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl ConditionBranch {
    /// 创建标志条件
    pub fn flag(
        kind: BranchKind,
        name: impl Into<String>,
        operator: Operator,
        value: bool,
        commands: Vec<Command>,
    ) -> Self {
        Self {
            kind,
            check_type: CheckType::Flag,
            flag_name: name.into(),
            variable_name: String::new(),
            operator,
            compare_value: CompareValue::Bool(value),
            commands,
        }
    }

    /// 创建变量条件
    pub fn variable(
        kind: BranchKind,
        name: impl Into<String>,
        operator: Operator,
        value: i64,
        commands: Vec<Command>,
    ) -> Self {
        Self {
            kind,
            check_type: CheckType::Variable,
            flag_name: String::new(),
            variable_name: name.into(),
            operator,
            compare_value: CompareValue::Int(value),
            commands,
        }
    }

    /// 创建 else 分支
    pub fn otherwise(commands: Vec<Command>) -> Self {
        Self {
            kind: BranchKind::Else,
            check_type: CheckType::Flag,
            flag_name: String::new(),
            variable_name: String::new(),
            operator: Operator::Eq,
            compare_value: CompareValue::Bool(true),
            commands,
        }
    }

    /// 当前检查类型对应的引用名
    pub fn operand(&self) -> &str {
        match self.check_type {
            CheckType::Flag => &self.flag_name,
            CheckType::Variable => &self.variable_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_op_clamps() {
        assert_eq!(VariableOp::Add.apply(250, 20), 255);
        assert_eq!(VariableOp::Subtract.apply(5, 20), 0);
        assert_eq!(VariableOp::Set.apply(10, 300), 255);
        assert_eq!(VariableOp::Set.apply(10, -3), 0);
        assert_eq!(VariableOp::Add.apply(10, -4), 6);
    }

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::new(
            "c1",
            CommandKind::SetFlag {
                flag_name: "met_alice".to_string(),
                value: true,
            },
        );
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "setFlag");
        assert_eq!(json["id"], "c1");
        assert_eq!(json["flagName"], "met_alice");
    }

    #[test]
    fn test_audio_command_tags() {
        let cmd = Command::new(
            "a1",
            CommandKind::PlayBgm(AudioParams {
                source: "bgm/theme".to_string(),
                volume: 80,
                pitch: 100,
            }),
        );
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "playBGM");
        assert_eq!(json["source"], "bgm/theme");

        let parsed: Command =
            serde_json::from_str(r#"{"id":"s","type":"stopBGS"}"#).unwrap();
        assert_eq!(parsed.kind, CommandKind::StopBgs);
    }

    #[test]
    fn test_audio_defaults() {
        let parsed: Command =
            serde_json::from_str(r#"{"id":"x","type":"playSFX","source":"sfx/door"}"#).unwrap();
        assert_eq!(
            parsed.kind,
            CommandKind::PlaySfx(SfxParams {
                source: "sfx/door".to_string(),
                volume: 100,
                pitch: 100,
                pan: 0,
            })
        );
    }

    #[test]
    fn test_condition_json_uses_operator_symbols() {
        let branch = ConditionBranch::variable(BranchKind::ElseIf, "score", Operator::GreaterEq, 3, vec![]);
        let json = serde_json::to_value(&branch).unwrap();
        assert_eq!(json["type"], "elseif");
        assert_eq!(json["checkType"], "variable");
        assert_eq!(json["operator"], ">=");
        assert_eq!(json["compareValue"], 3);
        assert_eq!(branch.operand(), "score");
    }

    #[test]
    fn test_choice_flag_effect() {
        assert_eq!(Choice::new("ok").flag_effect(), None);
        let c = Choice::new("ok").with_flag("brave", true).with_goto(2);
        assert_eq!(c.flag_effect(), Some(("brave", true)));
        assert!(c.enable_goto);
        assert_eq!(c.goto, 2);
    }

    #[test]
    fn test_frame_animation_frames() {
        let anim = FrameAnimation {
            frame_count: 4,
            frame_width: 32,
            frame_duration_ms: 100,
            looping: true,
        };
        assert_eq!(anim.frame_at(0), 0);
        assert_eq!(anim.frame_at(250), 2);
        assert_eq!(anim.frame_at(450), 0);

        let once = FrameAnimation { looping: false, ..anim };
        assert_eq!(once.frame_at(10_000), 3);
    }
}
