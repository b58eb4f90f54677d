//! # Input 模块
//!
//! 定义 Host 向解释器传递的输入事件。
//!
//! ## 设计说明
//!
//! - `RuntimeInput` 是 Host 采集用户操作后传递给解释器的抽象输入
//! - 解释器不直接处理指针坐标；点击命中由 `Player` 对照最近一帧的命中表完成
//! - 过渡动画的时间流逝由 Host 处理，结束时发送 `TransitionFinished`

use serde::{Deserialize, Serialize};

/// Host 向解释器传递的输入
///
/// - `Click`：解除 `WaitForClick` 等待
/// - `ChoiceSelected`：解除 `WaitForChoice` 等待，并传递用户选择
/// - `TransitionFinished`：解除 `WaitForTransition` 等待，执行场景跳转
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeInput {
    /// 用户点击
    Click,

    /// 用户选择了某个选项，`index` 从 0 开始
    ChoiceSelected { index: usize },

    /// 过渡动画到达终帧
    TransitionFinished,
}

impl RuntimeInput {
    /// 创建点击输入
    pub fn click() -> Self {
        Self::Click
    }

    /// 创建选择输入
    pub fn choice(index: usize) -> Self {
        Self::ChoiceSelected { index }
    }
}

/// 把 Host 指针坐标换算到画布坐标
///
/// 画布以整数倍 `scale` 放大显示；`scale` 为 0 时按 1 处理。
pub fn screen_to_canvas(x: f32, y: f32, scale: u32) -> (i32, i32) {
    let scale = scale.max(1) as f32;
    ((x / scale).floor() as i32, (y / scale).floor() as i32)
}
