//! # Effect 模块
//!
//! 解释器向 Host 发出的声明式效果。
//!
//! Effect 描述"发生了什么"，本身不执行任何操作；
//! 画面内容由渲染层根据解释器状态重新布局得到，效果只用于音频、淡入淡出和日志。

use serde::{Deserialize, Serialize};

use crate::audio::AudioCommand;
use crate::command::FrameAnimation;

/// 舞台图层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageLayer {
    Background,
    Character,
}

/// 图层可见性变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub layer: StageLayer,
    pub visible: bool,
    /// 淡入淡出时长，0 表示立即
    pub fade_ms: u32,
    /// 角色帧动画（仅 showCharacter）
    pub animation: Option<FrameAnimation>,
}

/// 解释器效果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// 进入场景
    SceneEntered { scene_index: usize },

    /// 显示对话
    ShowDialogue {
        /// None 表示旁白
        speaker: Option<String>,
        text: String,
    },

    /// 呈现选项
    PresentChoices { choices: Vec<String> },

    /// 标志被修改
    FlagChanged { name: String, value: bool },

    /// 变量被修改（已钳制）
    VariableChanged { name: String, value: u8 },

    /// 音频指令
    Audio(AudioCommand),

    /// 图层可见性变化
    Visibility(VisibilityChange),

    /// 开始场景过渡
    BeginTransition { from_scene: usize, to_scene: usize },

    /// 脚本执行完毕
    Halted,
}

impl Effect {
    /// 创建对话效果，空说话者视为旁白
    pub fn dialogue(speaker: &str, text: &str) -> Self {
        Self::ShowDialogue {
            speaker: (!speaker.is_empty()).then(|| speaker.to_string()),
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_speaker_is_narration() {
        assert_eq!(
            Effect::dialogue("", "……"),
            Effect::ShowDialogue {
                speaker: None,
                text: "……".to_string()
            }
        );
        assert!(matches!(
            Effect::dialogue("Alice", "hi"),
            Effect::ShowDialogue { speaker: Some(s), .. } if s == "Alice"
        ));
    }
}
