//! # Error 模块
//!
//! 定义 vn-core 中使用的错误类型。
//!
//! ## 分类
//!
//! - [`RuntimeError`]：脚本结构/创作错误，对当前执行路径是致命的，必须返回给调用方
//! - [`AssetError`]：资源错误，可恢复，总有视觉降级方案，不会阻塞播放
//! - [`ProjectError`]：工程文件读写错误
//!
//! 存档、过渡与导出错误定义在各自模块中，统一汇入 [`VnError`]。

use std::fmt;

use thiserror::Error;

use crate::export::ExportError;
use crate::save::SaveError;
use crate::transition::TransitionError;

/// 按名称引用的符号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// 标志（布尔）
    Flag,
    /// 变量（0-255 整数）
    Variable,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => write!(f, "标志"),
            Self::Variable => write!(f, "变量"),
        }
    }
}

/// 运行时错误
///
/// 旧实现会把这些情况静默钳制成默认值，从而掩盖创作错误；这里一律上报。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// 按名称引用的标志/变量不存在
    #[error("{kind} '{name}' 未定义")]
    UnresolvedReference { kind: ReferenceKind, name: String },

    /// 共享命令 ID 不存在
    #[error("共享命令 '{id}' 不存在")]
    DanglingSharedCommandId { id: String },

    /// 共享命令直接或间接调用自身
    #[error("共享命令 '{id}' 存在循环调用: {}", .chain.join(" -> "))]
    CyclicSharedCommand { id: String, chain: Vec<String> },

    /// 场景索引越界
    #[error("场景索引 {index} 越界，场景数量为 {scene_count}")]
    SceneIndexOutOfRange { index: usize, scene_count: usize },

    /// 分支结构不合法（if 不在首位、else 不在末尾等）
    #[error("分支结构不合法: {message}")]
    MalformedBranch { message: String },

    /// 条件无法求值（运算符或比较值类型不匹配）
    #[error("条件无效: {message}")]
    InvalidCondition { message: String },

    /// 无效的选择索引
    #[error("无效的选择索引 {index}，有效范围是 0..{max}")]
    InvalidChoiceIndex { index: usize, max: usize },

    /// 执行位置无法解析（工程在暂停期间被修改）
    #[error("执行位置无效: {message}")]
    InvalidPosition { message: String },

    /// 单次推进执行的命令数超过上限（无等待的跳转循环）
    #[error("单次推进执行超过 {limit} 条命令，脚本可能存在无等待的循环")]
    StepLimitExceeded { limit: usize },
}

/// 资源错误
///
/// 这些错误总是可恢复的：渲染管线会降级为占位图形并记录错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// 九宫格皮肤尺寸不符合 16×16 约定
    #[error("九宫格素材 '{handle}' 尺寸为 {width}×{height}，期望 16×16")]
    MalformedNinePatchAsset {
        handle: String,
        width: u32,
        height: u32,
    },

    /// 图片/字体加载失败
    #[error("资源 '{handle}' 加载失败: {message}")]
    AssetLoadFailure { handle: String, message: String },
}

/// 工程文件错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    /// JSON 反序列化失败
    #[error("工程文件解析失败: {0}")]
    Parse(String),

    /// JSON 序列化失败
    #[error("工程文件序列化失败: {0}")]
    Serialize(String),

    /// 分辨率不是固定画布尺寸
    #[error("不支持的分辨率 {width}×{height}，画布固定为 {expected_width}×{expected_height}")]
    UnsupportedResolution {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// vn-core 统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VnError {
    /// 运行时错误
    #[error("运行时错误: {0}")]
    Runtime(#[from] RuntimeError),

    /// 资源错误
    #[error("资源错误: {0}")]
    Asset(#[from] AssetError),

    /// 工程文件错误
    #[error("工程错误: {0}")]
    Project(#[from] ProjectError),

    /// 存档错误
    #[error("存档错误: {0}")]
    Save(#[from] SaveError),

    /// 过渡错误
    #[error("过渡错误: {0}")]
    Transition(#[from] TransitionError),

    /// 导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
}

/// Result 类型别名
pub type VnResult<T> = Result<T, VnError>;
