//! # State 模块
//!
//! 定义解释器的运行时状态和等待模型。
//!
//! ## 设计原则
//!
//! - 所有状态必须**显式建模**
//! - 所有状态必须**可序列化**（支持扁平 JSON 存档）
//! - 不允许隐式全局状态：编辑器视图状态通过 `ViewState` 显式传入渲染层

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::FrameAnimation;
use crate::condition::SymbolTable;
use crate::project::{Project, Scene};

/// 等待原因
///
/// # 状态转换
///
/// ```text
/// None              -> 继续执行，不等待
/// WaitForClick      -> 线性对话，收到 Click 后继续
/// WaitForChoice     -> 带选项的对话，只有 ChoiceSelected 能推进
/// WaitForTransition -> 场景过渡进行中，收到 TransitionFinished 后跳转
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitingReason {
    /// 不等待
    #[default]
    None,

    /// 等待点击
    WaitForClick,

    /// 等待选择
    ///
    /// `choice_count` 用于验证输入合法性
    WaitForChoice { choice_count: usize },

    /// 等待过渡动画结束
    WaitForTransition { target_scene: usize },
}

impl WaitingReason {
    /// 是否处于等待状态
    pub fn is_waiting(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// 创建等待选择状态
    pub fn choice(count: usize) -> Self {
        Self::WaitForChoice {
            choice_count: count,
        }
    }
}

/// 内联子列表的一层
///
/// `command_index` 是拥有该子列表的命令（分支或共享调用）在父列表中的索引。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListFrame {
    /// 条件分支的某一支
    Branch {
        command_index: usize,
        condition_index: usize,
    },
    /// 共享命令组
    Shared {
        command_index: usize,
        group_id: String,
    },
}

impl ListFrame {
    /// 拥有该子列表的命令在父列表中的索引
    pub fn owner_index(&self) -> usize {
        match self {
            Self::Branch { command_index, .. } | Self::Shared { command_index, .. } => {
                *command_index
            }
        }
    }
}

/// 脚本执行位置
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptPosition {
    /// 当前场景索引
    pub scene_index: usize,
    /// 从场景命令列表到当前子列表的路径（最内层在末尾）
    #[serde(default)]
    pub frames: Vec<ListFrame>,
    /// 当前子列表中的命令索引
    pub command_index: usize,
}

impl ScriptPosition {
    /// 场景开头
    pub fn scene_start(scene_index: usize) -> Self {
        Self {
            scene_index,
            frames: Vec::new(),
            command_index: 0,
        }
    }

    /// 前进到下一条命令
    pub fn advance(&mut self) {
        self.command_index += 1;
    }

    /// 进入子列表
    pub fn enter(&mut self, frame: ListFrame) {
        self.frames.push(frame);
        self.command_index = 0;
    }

    /// 离开当前子列表，回到拥有者之后的命令
    ///
    /// 已在场景顶层时返回 `false`。
    pub fn leave(&mut self) -> bool {
        match self.frames.pop() {
            Some(frame) => {
                self.command_index = frame.owner_index() + 1;
                true
            }
            None => false,
        }
    }

    /// 跳转到场景开头
    pub fn jump_to_scene(&mut self, scene_index: usize) {
        *self = Self::scene_start(scene_index);
    }

    /// 嵌套深度（0 表示场景顶层）
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// 舞台可见性状态
///
/// 由可见性命令修改，进入场景时按场景定义重置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    pub background_visible: bool,
    pub character_visible: bool,
    /// 当前角色帧动画
    #[serde(default)]
    pub character_animation: Option<FrameAnimation>,
}

impl StageState {
    /// 按场景定义初始化
    pub fn for_scene(scene: &Scene) -> Self {
        Self {
            background_visible: true,
            character_visible: scene.character_visible,
            character_animation: None,
        }
    }
}

impl Default for StageState {
    fn default() -> Self {
        Self {
            background_visible: true,
            character_visible: true,
            character_animation: None,
        }
    }
}

/// 运行时状态
///
/// 这是解释器的**唯一可变状态**，全部字段可序列化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    /// 执行位置
    pub position: ScriptPosition,
    /// 标志当前值（按名称）
    pub flags: BTreeMap<String, bool>,
    /// 变量当前值（按名称）
    pub variables: BTreeMap<String, u8>,
    /// 舞台可见性
    pub stage: StageState,
    /// 当前等待状态
    pub waiting: WaitingReason,
    /// 是否已执行完毕
    #[serde(default)]
    pub finished: bool,
}

impl RuntimeState {
    /// 以工程的初始值创建状态
    pub fn new(project: &Project) -> Self {
        let stage = project
            .scenes
            .first()
            .map(StageState::for_scene)
            .unwrap_or_default();
        Self {
            position: ScriptPosition::scene_start(0),
            flags: project
                .flags
                .iter()
                .map(|f| (f.name.clone(), f.value))
                .collect(),
            variables: project
                .variables
                .iter()
                .map(|v| (v.name.clone(), v.value))
                .collect(),
            stage,
            waiting: WaitingReason::None,
            finished: project.scenes.is_empty(),
        }
    }

    /// 进入等待状态
    pub fn wait(&mut self, reason: WaitingReason) {
        self.waiting = reason;
    }

    /// 清除等待状态
    pub fn clear_wait(&mut self) {
        self.waiting = WaitingReason::None;
    }
}

impl SymbolTable for RuntimeState {
    fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    fn variable(&self, name: &str) -> Option<u8> {
        self.variables.get(name).copied()
    }
}
