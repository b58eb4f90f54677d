//! # VN Core
//!
//! 像素风视觉小说的场景脚本执行引擎。
//!
//! ## 架构概述
//!
//! `vn-core` 是纯逻辑核心：不读文件、不读时钟（单调时间由调用方以 `Duration` 传入）、
//! 不依赖窗口系统。编辑器预览与导出的单文件 HTML 运行的是同一份实现。
//!
//! ```text
//! Host                              Core
//!   │                                 │
//!   │──── RuntimeInput ──────────────►│ Interpreter::tick()
//!   │◄─── (Vec<Effect>, WaitingReason)│
//!   │                                 │
//!   │──── on_click(x, y) ────────────►│ Player（命中测试 + 过渡）
//!   │◄─── RgbaImage ──────────────────│ frame(now)
//! ```
//!
//! ## 核心类型
//!
//! - [`Project`]：工程数据（场景、命令、标志、变量、共享命令组）
//! - [`Interpreter`]：命令解释器，决定"现在画面上是什么"
//! - [`Effect`]：解释器向 Host 发出的副作用（对话、音频、过渡等）
//! - [`WaitingReason`]：解释器的等待状态
//! - [`FrameDescriptor`]：布局结果（绘制列表 + 选项命中表）
//! - [`Player`]：点击分发与过渡调度
//!
//! ## 使用示例
//!
//! ```ignore
//! use vn_core::{AssetStore, Player, Project};
//!
//! let project = Project::from_json(&json)?;
//! let assets = AssetStore::new();
//! let epoch = Instant::now();
//! let mut player = Player::new(project);
//! player.start(&assets, epoch.elapsed())?;
//!
//! loop {
//!     if let Some(frame) = player.frame(&assets, epoch.elapsed())? {
//!         present(frame);
//!     }
//!     if let Some((x, y)) = poll_click() {
//!         player.on_click(x, y, &assets, epoch.elapsed())?;
//!     }
//!     dispatch_audio(&player.take_effects(), &mut audio);
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`project`] / [`command`]：数据模型
//! - [`condition`]：条件求值
//! - [`runtime`]：解释器
//! - [`render`]：布局与光栅化
//! - [`transition`]：渐变遮罩过渡
//! - [`player`]：点击分发
//! - [`diagnostic`]：工程静态检查
//! - [`save`] / [`export`]：存档快照与单文件导出

pub mod audio;
pub mod command;
pub mod condition;
pub mod diagnostic;
pub mod effect;
pub mod error;
pub mod export;
pub mod input;
pub mod player;
pub mod project;
pub mod render;
pub mod runtime;
pub mod save;
pub mod state;
pub mod transition;

// 重导出核心类型
pub use audio::{AudioChannel, AudioCommand, AudioPort, apply_audio, dispatch_audio};
pub use command::{
    AudioParams, BranchKind, CheckType, Choice, Command, CommandKind, CompareValue,
    ConditionBranch, FadeParams, FrameAnimation, Operator, SfxParams, VariableOp,
};
pub use condition::{SymbolTable, evaluate, select_branch};
pub use diagnostic::{
    AssetKind, AssetReference, Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_project,
    collect_asset_references,
};
pub use effect::{Effect, StageLayer, VisibilityChange};
pub use error::{AssetError, ProjectError, ReferenceKind, RuntimeError, VnError, VnResult};
pub use export::{ExportError, ExportOptions, RuntimeBundle, export_html};
pub use input::{RuntimeInput, screen_to_canvas};
pub use player::{ClickOutcome, Player};
pub use project::{AssetEntry, Flag, Project, Scene, Settings, SharedCommandGroup, Variable};
pub use render::{
    AssetCatalog, AssetState, AssetStore, ChoiceHitTable, DrawCall, DrawOp, FixedMetrics,
    FrameDescriptor, HitBox, Layer, Rect, Rgba, TextMetrics,
};
pub use runtime::Interpreter;
pub use save::{SaveData, SaveError, SaveMetadata, SaveVersion};
pub use state::{RuntimeState, ScriptPosition, StageState, WaitingReason};
pub use transition::{TransitionError, TransitionManager};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let project = Project {
            scenes: vec![Scene::new("a").with_commands(vec![Command::dialogue("1", "", "hi")])],
            ..Project::default()
        };
        let mut interpreter = Interpreter::new(&project);
        let (effects, waiting) = interpreter.start(&project).unwrap();

        assert_eq!(waiting, WaitingReason::WaitForClick);
        assert_eq!(effects.last(), Some(&Effect::dialogue("", "hi")));
        assert!(analyze_project(&project).is_empty());
    }
}
