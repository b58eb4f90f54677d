//! # Save 模块
//!
//! 扁平 JSON 存档快照。
//!
//! ## 设计原则
//!
//! - 存档只包含解释器状态，不包含过渡进度等临时画面状态
//! - 必须有版本号，读取时检查主版本兼容性

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::Interpreter;
use crate::state::RuntimeState;

/// 存档格式版本
///
/// - MAJOR: 不兼容的格式变更
/// - MINOR: 向后兼容的新字段
pub const SAVE_VERSION_MAJOR: u32 = 1;
pub const SAVE_VERSION_MINOR: u32 = 0;

/// 存档版本信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveVersion {
    pub major: u32,
    pub minor: u32,
}

impl SaveVersion {
    /// 当前版本
    pub fn current() -> Self {
        Self {
            major: SAVE_VERSION_MAJOR,
            minor: SAVE_VERSION_MINOR,
        }
    }

    /// 主版本相同即兼容
    pub fn is_compatible(&self) -> bool {
        self.major == SAVE_VERSION_MAJOR
    }
}

impl Default for SaveVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for SaveVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// 存档元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// 存档槽位号（1-based）
    pub slot: u32,
    /// 保存时间（Unix 秒，由宿主提供）
    pub timestamp: u64,
    /// 保存时所在场景（用于 UI 显示）
    pub scene_index: usize,
}

/// 存档数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: SaveVersion,
    pub metadata: SaveMetadata,
    pub runtime_state: RuntimeState,
}

impl SaveData {
    /// 从运行时状态创建存档
    ///
    /// 核心不读系统时钟，`timestamp` 由宿主传入。
    pub fn new(slot: u32, timestamp: u64, runtime_state: RuntimeState) -> Self {
        Self {
            version: SaveVersion::current(),
            metadata: SaveMetadata {
                slot,
                timestamp,
                scene_index: runtime_state.position.scene_index,
            },
            runtime_state,
        }
    }

    /// 快照解释器当前状态
    pub fn capture(slot: u32, timestamp: u64, interpreter: &Interpreter) -> Self {
        Self::new(slot, timestamp, interpreter.state().clone())
    }

    /// 用存档状态重建解释器
    pub fn restore(self) -> Interpreter {
        Interpreter::restore(self.runtime_state)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, SaveError> {
        serde_json::to_string_pretty(self).map_err(|e| SaveError::SerializationFailed(e.to_string()))
    }

    /// 从 JSON 字符串反序列化
    pub fn from_json(json: &str) -> Result<Self, SaveError> {
        let data: SaveData = serde_json::from_str(json)
            .map_err(|e| SaveError::DeserializationFailed(e.to_string()))?;

        if !data.version.is_compatible() {
            return Err(SaveError::IncompatibleVersion {
                save_version: data.version.to_string(),
                current_version: SaveVersion::current().to_string(),
            });
        }

        Ok(data)
    }
}

/// 存档错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error("序列化失败: {0}")]
    SerializationFailed(String),

    #[error("反序列化失败: {0}")]
    DeserializationFailed(String),

    #[error("存档版本不兼容: 存档版本 {save_version} vs 当前版本 {current_version}")]
    IncompatibleVersion {
        save_version: String,
        current_version: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::project::{Flag, Project, Scene};

    fn project() -> Project {
        Project {
            flags: vec![Flag {
                id: "f".to_string(),
                name: "seen".to_string(),
                value: false,
            }],
            scenes: vec![
                Scene::new("a").with_commands(vec![Command::dialogue("1", "", "one")]),
                Scene::new("b").with_commands(vec![
                    Command::dialogue("2", "", "two"),
                    Command::dialogue("3", "", "three"),
                ]),
            ],
            ..Project::default()
        }
    }

    #[test]
    fn test_save_version_compatibility() {
        assert!(SaveVersion::current().is_compatible());
        assert!(SaveVersion { major: 1, minor: 7 }.is_compatible());
        assert!(!SaveVersion { major: 2, minor: 0 }.is_compatible());
        assert_eq!(SaveVersion { major: 1, minor: 2 }.to_string(), "1.2");
    }

    #[test]
    fn test_capture_and_restore() {
        let project = project();
        let mut interp = Interpreter::new(&project);
        interp.start(&project).unwrap();
        interp.advance(&project).unwrap();

        let save = SaveData::capture(3, 1_700_000_000, &interp);
        assert_eq!(save.metadata.scene_index, 1);
        assert_eq!(save.metadata.timestamp, 1_700_000_000);

        let json = save.to_json().unwrap();
        let loaded = SaveData::from_json(&json).unwrap();
        assert_eq!(loaded, save);

        let mut restored = loaded.restore();
        // 恢复后不会重复发出进入场景效果
        let (effects, _) = restored.advance(&project).unwrap();
        assert_eq!(
            effects,
            vec![crate::effect::Effect::dialogue("", "three")]
        );
    }

    #[test]
    fn test_incompatible_version_error() {
        let project = project();
        let mut save = SaveData::new(1, 0, RuntimeState::new(&project));
        save.version.major = 99;
        let json = serde_json::to_string(&save).unwrap();

        assert!(matches!(
            SaveData::from_json(&json),
            Err(SaveError::IncompatibleVersion { .. })
        ));
        assert!(matches!(
            SaveData::from_json("{}"),
            Err(SaveError::DeserializationFailed(_))
        ));
    }
}
