//! 图层就绪检查
//!
//! 图片异步加载时，任何图层都不允许在其下方图层就绪前出现在画面上。
//! Host 只在 `Ready` 时光栅化，否则保留上一帧完整画面。

use super::assets::{AssetCatalog, AssetState};
use super::{DrawOp, FrameDescriptor, Layer};

/// 就绪状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staging {
    /// 第一个仍在加载的图层
    Waiting { layer: Layer, handle: String },
    /// 全部图层就绪
    Ready,
}

impl Staging {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// 按绘制顺序检查各图层引用的图片
pub fn stage_frame(desc: &FrameDescriptor, assets: &impl AssetCatalog) -> Staging {
    for call in &desc.calls {
        let handle = match &call.op {
            DrawOp::Image { handle, .. } | DrawOp::NineSlice { handle, .. } => handle,
            _ => continue,
        };
        if matches!(assets.image(handle), AssetState::Pending) {
            return Staging::Waiting {
                layer: call.layer,
                handle: handle.clone(),
            };
        }
    }
    Staging::Ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{AssetStore, DrawCall, Rect};
    use image::RgbaImage;

    fn image_call(layer: Layer, handle: &str) -> DrawCall {
        DrawCall {
            layer,
            op: DrawOp::Image {
                handle: handle.to_string(),
                src: Rect::new(0, 0, 1, 1),
                dest: Rect::new(0, 0, 1, 1),
                opacity: 255,
            },
        }
    }

    #[test]
    fn test_first_pending_layer_blocks() {
        let desc = FrameDescriptor {
            calls: vec![
                image_call(Layer::Background, "bg"),
                image_call(Layer::Character, "hero"),
            ],
            ..FrameDescriptor::default()
        };
        let mut store = AssetStore::new();
        store.insert("bg", RgbaImage::new(1, 1));
        store.mark_pending("hero");
        assert_eq!(
            stage_frame(&desc, &store),
            Staging::Waiting {
                layer: Layer::Character,
                handle: "hero".to_string()
            }
        );

        store.mark_failed("hero", "404");
        assert!(stage_frame(&desc, &store).is_ready());
    }
}
