//! # Runtime 模块
//!
//! 场景脚本执行引擎，负责命令执行和状态管理。
//!
//! ## 模块结构
//!
//! - [`engine`]：解释器主循环
//! - [`executor`]：单条命令的执行
//! - [`expand`]：共享命令组的环检查

pub mod engine;
pub mod executor;
pub mod expand;

pub use engine::{resolve_list, Interpreter, MAX_STEPS_PER_TICK};
pub use executor::{ExecuteResult, Executor, Flow};
pub use expand::{check_shared_group, shared_calls};
