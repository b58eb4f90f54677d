//! 图片资源目录
//!
//! 资源以不透明的字符串句柄寻址（角色/背景条目 ID 或皮肤句柄）。
//! 加载由 Host 异步完成；核心只观察每个句柄的状态。

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::diagnostic::{collect_asset_references, AssetReference};
use crate::error::AssetError;
use crate::project::Project;

/// 资源状态
#[derive(Debug, Clone, Copy)]
pub enum AssetState<'a> {
    /// 仍在加载
    Pending,
    /// 已解码
    Ready(&'a RgbaImage),
    /// 加载失败或未注册
    Failed(&'a str),
}

/// 资源目录接口
pub trait AssetCatalog {
    fn image(&self, handle: &str) -> AssetState<'_>;
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Ready(RgbaImage),
    Failed(String),
}

/// 内存资源目录
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    slots: HashMap<String, Slot>,
}

const NOT_REGISTERED: &str = "资源未注册";

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入已解码的图片
    pub fn insert(&mut self, handle: impl Into<String>, image: RgbaImage) {
        self.slots.insert(handle.into(), Slot::Ready(image));
    }

    /// 标记为加载中
    pub fn mark_pending(&mut self, handle: impl Into<String>) {
        self.slots.insert(handle.into(), Slot::Pending);
    }

    /// 标记为加载失败
    pub fn mark_failed(&mut self, handle: impl Into<String>, message: impl Into<String>) {
        self.slots.insert(handle.into(), Slot::Failed(message.into()));
    }

    /// 解码图片字节（PNG / JPEG / WebP）并放入目录
    ///
    /// 解码失败时句柄被标记为失败，渲染会降级为占位图形。
    pub fn load_encoded(&mut self, handle: &str, bytes: &[u8]) -> Result<(), AssetError> {
        match image::load_from_memory(bytes) {
            Ok(decoded) => {
                self.insert(handle, decoded.to_rgba8());
                Ok(())
            }
            Err(e) => {
                warn!(handle, error = %e, "图片解码失败");
                self.mark_failed(handle, e.to_string());
                Err(AssetError::AssetLoadFailure {
                    handle: handle.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// 解码工程里以 data URL 内嵌的图片
    ///
    /// 返回来源是外部路径、需要 Host 自行加载的图片引用。
    pub fn load_embedded(&mut self, project: &Project) -> Vec<AssetReference> {
        let mut external = Vec::new();
        for reference in collect_asset_references(project) {
            let Some(source) = reference.image_source(project) else {
                continue;
            };
            match decode_data_url(&reference.handle, source) {
                Ok(Some(bytes)) => {
                    // 解码失败时槽位已记为失败
                    let _ = self.load_encoded(&reference.handle, &bytes);
                }
                Ok(None) => external.push(reference),
                Err(error) => {
                    warn!(error = %error, "内嵌资源无效");
                    self.mark_failed(&reference.handle, error.to_string());
                }
            }
        }
        debug!(loaded = self.len(), external = external.len(), "内嵌资源已加载");
        external
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// 解析 `data:<mime>;base64,<payload>`
///
/// 不是 data URL 时返回 `Ok(None)`。
pub fn decode_data_url(handle: &str, source: &str) -> Result<Option<Vec<u8>>, AssetError> {
    let Some(rest) = source.strip_prefix("data:") else {
        return Ok(None);
    };
    let failure = |message: String| AssetError::AssetLoadFailure {
        handle: handle.to_string(),
        message,
    };
    let (_, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| failure("data URL 不是 base64 编码".to_string()))?;
    STANDARD
        .decode(payload)
        .map(Some)
        .map_err(|e| failure(e.to_string()))
}

impl AssetCatalog for AssetStore {
    fn image(&self, handle: &str) -> AssetState<'_> {
        match self.slots.get(handle) {
            Some(Slot::Pending) => AssetState::Pending,
            Some(Slot::Ready(image)) => AssetState::Ready(image),
            Some(Slot::Failed(message)) => AssetState::Failed(message),
            None => AssetState::Failed(NOT_REGISTERED),
        }
    }
}
