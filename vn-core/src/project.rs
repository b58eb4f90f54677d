//! # Project 模块
//!
//! 工程数据模型：场景、标志、变量、共享命令组与设置。
//!
//! ## 设计说明
//!
//! - 工程作为**一个** JSON 文档整体读写
//! - 加载器向后兼容：缺失的 `settings` / `flags` 等字段按默认值补齐
//! - 标志与变量按**名称**引用，重命名不会级联更新引用方

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::{ProjectError, RuntimeError};

/// 默认画布宽度
pub const CANVAS_WIDTH: u32 = 256;
/// 默认画布高度
pub const CANVAS_HEIGHT: u32 = 192;
/// 默认过渡时长（毫秒）
pub const DEFAULT_TRANSITION_MS: u64 = 800;

/// 标志
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub id: String,
    /// 名称（唯一，可修改）
    pub name: String,
    #[serde(default)]
    pub value: bool,
}

/// 变量，取值范围 [0, 255]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: u8,
}

/// 场景
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// 背景色 `#rrggbb`
    #[serde(default = "default_background_color")]
    pub background_color: String,
    /// 背景图片（优先于背景色）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_id: Option<String>,
    /// 角色槽位
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    /// 进入场景时角色是否可见
    #[serde(default = "default_true")]
    pub character_visible: bool,
    /// 有序命令列表
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Scene {
    /// 创建纯色背景的空场景
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            background_color: default_background_color(),
            background_id: None,
            character_id: None,
            character_visible: true,
            commands: Vec::new(),
        }
    }

    /// 设置命令列表
    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = commands;
        self
    }
}

/// 共享命令组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedCommandGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

/// 角色/背景素材目录项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// 不透明的图片句柄（URL、data URL 等），由外部解析
    #[serde(default)]
    pub image: String,
}

/// 工程设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 显示缩放倍数
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// 字体名
    #[serde(default = "default_font")]
    pub font: String,
    /// 自定义字体句柄
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_font: Option<String>,
    /// 消息框九宫格皮肤
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_box_image: Option<String>,
    /// 名字框九宫格皮肤
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_box_image: Option<String>,
    /// 选项行九宫格皮肤
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_box_image: Option<String>,
    /// 过渡遮罩图
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_image: Option<String>,
    /// 过渡时长（毫秒）
    #[serde(default = "default_transition_ms")]
    pub transition_duration_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            font: default_font(),
            custom_font: None,
            message_box_image: None,
            name_box_image: None,
            choice_box_image: None,
            transition_image: None,
            transition_duration_ms: default_transition_ms(),
        }
    }
}

/// 工程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub title: String,
    /// 画布分辨率，固定为 256×192
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default)]
    pub flags: Vec<Flag>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub shared_commands: Vec<SharedCommandGroup>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub characters: Vec<AssetEntry>,
    #[serde(default)]
    pub backgrounds: Vec<AssetEntry>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            title: String::new(),
            resolution: default_resolution(),
            flags: Vec::new(),
            variables: Vec::new(),
            scenes: Vec::new(),
            shared_commands: Vec::new(),
            settings: Settings::default(),
            characters: Vec::new(),
            backgrounds: Vec::new(),
        }
    }
}

impl Project {
    /// 从 JSON 加载工程（缺失字段按默认值补齐）
    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        let project: Self =
            serde_json::from_str(json).map_err(|e| ProjectError::Parse(e.to_string()))?;
        project.check_resolution()?;
        Ok(project)
    }

    /// 布局常量按 256×192 设计，其他分辨率直接拒绝
    pub fn check_resolution(&self) -> Result<(), ProjectError> {
        let [width, height] = self.resolution;
        if (width, height) != (CANVAS_WIDTH, CANVAS_HEIGHT) {
            return Err(ProjectError::UnsupportedResolution {
                width,
                height,
                expected_width: CANVAS_WIDTH,
                expected_height: CANVAS_HEIGHT,
            });
        }
        Ok(())
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, ProjectError> {
        serde_json::to_string_pretty(self).map_err(|e| ProjectError::Serialize(e.to_string()))
    }

    /// 画布宽度（不随 `resolution` 字段变化）
    pub fn width(&self) -> u32 {
        CANVAS_WIDTH
    }

    pub fn height(&self) -> u32 {
        CANVAS_HEIGHT
    }

    /// 按索引获取场景，越界时报错
    pub fn scene(&self, index: usize) -> Result<&Scene, RuntimeError> {
        self.scenes
            .get(index)
            .ok_or(RuntimeError::SceneIndexOutOfRange {
                index,
                scene_count: self.scenes.len(),
            })
    }

    /// 校验场景索引
    pub fn check_scene_index(&self, index: usize) -> Result<(), RuntimeError> {
        self.scene(index).map(|_| ())
    }

    /// 按 ID 获取共享命令组
    pub fn shared_group(&self, id: &str) -> Result<&SharedCommandGroup, RuntimeError> {
        self.shared_commands
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| RuntimeError::DanglingSharedCommandId { id: id.to_string() })
    }

    /// 按名称查找标志
    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// 按名称查找变量
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// 按 ID 查找角色素材
    pub fn character(&self, id: &str) -> Option<&AssetEntry> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// 按 ID 查找背景素材
    pub fn background(&self, id: &str) -> Option<&AssetEntry> {
        self.backgrounds.iter().find(|b| b.id == id)
    }
}

// 默认值函数
fn default_resolution() -> [u32; 2] {
    [CANVAS_WIDTH, CANVAS_HEIGHT]
}

fn default_scale() -> u32 {
    2
}

fn default_font() -> String {
    "default".to_string()
}

fn default_transition_ms() -> u64 {
    DEFAULT_TRANSITION_MS
}

fn default_background_color() -> String {
    "#000000".to_string()
}

fn default_true() -> bool {
    true
}
