//! # Config 模块
//!
//! 命令行工具的配置管理。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (vn.json)
//! 3. 默认值（最低）

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 资源根目录，资源句柄相对于它解析
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// 无头播放时帧图片的输出目录
    #[serde(default = "default_frames_dir")]
    pub frames_dir: PathBuf,

    /// 日志级别（trace/debug/info/warn/error）
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 无头播放的模拟帧间隔（毫秒）
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// 是否在画面上显示场景编号
    #[serde(default)]
    pub show_scene_index: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            frames_dir: default_frames_dir(),
            log_level: default_log_level(),
            frame_interval_ms: default_frame_interval_ms(),
            show_scene_index: false,
        }
    }
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_frames_dir() -> PathBuf {
    PathBuf::from("frames")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_frame_interval_ms() -> u64 {
    100
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub assets_dir: Option<PathBuf>,
    pub frames_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub frame_interval_ms: Option<u64>,
    pub show_scene_index: bool,
}

impl AppConfig {
    /// 加载配置文件
    ///
    /// 文件不存在时使用默认配置；文件存在但解析失败是错误。
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("配置文件解析失败: {}", path.display()))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 应用命令行覆盖
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(dir) = overrides.assets_dir {
            self.assets_dir = dir;
        }
        if let Some(dir) = overrides.frames_dir {
            self.frames_dir = dir;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(ms) = overrides.frame_interval_ms {
            self.frame_interval_ms = ms;
        }
        self.show_scene_index |= overrides.show_scene_index;
        self
    }

    /// 解析日志级别
    pub fn level(&self) -> anyhow::Result<Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("无效的日志级别: {}", self.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = AppConfig::from_json(r#"{ "frames_dir": "out" }"#).unwrap();
        assert_eq!(config.frames_dir, PathBuf::from("out"));
        assert_eq!(config.assets_dir, PathBuf::from("assets"));
        assert_eq!(config.frame_interval_ms, 100);
        assert_eq!(config.level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = AppConfig::from_json(r#"{ "log_level": "warn", "frame_interval_ms": 50 }"#)
            .unwrap()
            .apply(Overrides {
                log_level: Some("debug".to_string()),
                show_scene_index: true,
                ..Overrides::default()
            });
        assert_eq!(config.level().unwrap(), Level::DEBUG);
        assert_eq!(config.frame_interval_ms, 50);
        assert!(config.show_scene_index);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("definitely/not/here/vn.json").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_level() {
        let config = AppConfig {
            log_level: "loud".to_string(),
            ..AppConfig::default()
        };
        assert!(config.level().is_err());
    }
}
