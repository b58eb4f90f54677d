//! # Render 模块
//!
//! 布局与渲染管线。
//!
//! ## 流程
//!
//! ```text
//! layout_frame(input) -> FrameDescriptor { calls, hit_table }
//! stage_frame(desc)   -> Waiting | Ready
//! rasterize(desc)     -> RgbaImage
//! ```
//!
//! 布局是纯函数：同样的输入总是产生同样的绘制列表和命中表。
//! 命中表与绘制使用**同一组**矩形，点击判定与画面严格一致。

pub mod assets;
pub mod layout;
pub mod metrics;
pub mod nine_slice;
pub mod raster;
pub mod stage;
pub mod wrap;

use serde::{Deserialize, Serialize};

use crate::error::AssetError;

pub use assets::{AssetCatalog, AssetState, AssetStore};
pub use layout::{layout_frame, LayerOpacity, LayoutInput, ViewState};
pub use metrics::{FixedMetrics, Glyph, TextMetrics};
pub use raster::rasterize;
pub use stage::{stage_frame, Staging};
pub use wrap::wrap_text;

/// 画布上的矩形（半开区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// 点是否落在矩形内（左/上边界包含，右/下边界不包含）
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// 两个矩形的交集，不相交时返回 `None`
    pub fn intersect(&self, other: Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
    }
}

/// 直通 alpha 的 RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// 解析 `#rrggbb`，格式不对时返回黑色
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Self::BLACK;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        match (channel(0), channel(2), channel(4)) {
            (Some(r), Some(g), Some(b)) => Self([r, g, b, 255]),
            _ => Self::BLACK,
        }
    }

    /// 乘以不透明度
    pub fn with_opacity(self, opacity: u8) -> Self {
        let [r, g, b, a] = self.0;
        Self([r, g, b, ((u16::from(a) * u16::from(opacity) + 127) / 255) as u8])
    }
}

/// 绘制图层，按声明顺序从下到上
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Background,
    Character,
    MessageBox,
    NameBox,
    Text,
    Choices,
    AdvanceArrow,
    SceneIndex,
}

/// 绘制操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawOp {
    /// 填充矩形
    Fill { rect: Rect, color: Rgba },
    /// 绘制图片的 `src` 区域到 `dest`（最近邻缩放）
    Image {
        handle: String,
        src: Rect,
        dest: Rect,
        opacity: u8,
    },
    /// 九宫格皮肤
    NineSlice { handle: String, dest: Rect },
    /// 单行文本，`(x, y)` 为行框左上角
    Text {
        text: String,
        x: i32,
        y: i32,
        color: Rgba,
    },
    /// 7×4 向下三角形推进箭头
    AdvanceArrow { x: i32, y: i32, color: Rgba },
}

/// 带图层的绘制调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawCall {
    pub layer: Layer,
    pub op: DrawOp,
}

/// 选项命中框
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitBox {
    pub rect: Rect,
    pub choice_index: usize,
}

/// 选项命中表
///
/// 由布局产生，与选项行的绘制矩形完全一致。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChoiceHitTable {
    pub boxes: Vec<HitBox>,
}

impl ChoiceHitTable {
    /// 返回命中的选项索引
    pub fn hit_test(&self, x: i32, y: i32) -> Option<usize> {
        self.boxes
            .iter()
            .find(|b| b.rect.contains(x, y))
            .map(|b| b.choice_index)
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }
}

/// 一帧的布局结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    /// 按图层顺序排列的绘制调用
    pub calls: Vec<DrawCall>,
    pub hit_table: ChoiceHitTable,
    /// 本帧发生的资源降级
    pub degraded: Vec<AssetError>,
}

impl FrameDescriptor {
    /// 某一图层的全部绘制操作
    pub fn layer_ops(&self, layer: Layer) -> impl Iterator<Item = &DrawOp> {
        self.calls
            .iter()
            .filter(move |c| c.layer == layer)
            .map(|c| &c.op)
    }

    /// 出现过的图层（按绘制顺序去重）
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers: Vec<Layer> = Vec::new();
        for call in &self.calls {
            if layers.last() != Some(&call.layer) {
                layers.push(call.layer);
            }
        }
        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_is_half_open() {
        let r = Rect::new(10, 20, 5, 3);
        assert!(r.contains(10, 20));
        assert!(r.contains(14, 22));
        assert!(!r.contains(15, 20));
        assert!(!r.contains(10, 23));
        assert!(!r.contains(9, 21));
    }

    #[test]
    fn test_rect_intersect() {
        let canvas = Rect::new(0, 0, 256, 192);
        assert_eq!(
            Rect::new(-10, 180, 30, 50).intersect(canvas),
            Some(Rect::new(0, 180, 20, 12))
        );
        assert_eq!(Rect::new(256, 0, 4, 4).intersect(canvas), None);
        assert_eq!(Rect::new(10, 10, 0, 5).intersect(canvas), None);
    }

    #[test]
    fn test_rgba_from_hex() {
        assert_eq!(Rgba::from_hex("#ff8000"), Rgba([255, 128, 0, 255]));
        assert_eq!(Rgba::from_hex("102030"), Rgba([16, 32, 48, 255]));
        assert_eq!(Rgba::from_hex("#zzzzzz"), Rgba::BLACK);
        assert_eq!(Rgba::from_hex("#fff"), Rgba::BLACK);
    }

    #[test]
    fn test_hit_table_first_match() {
        let table = ChoiceHitTable {
            boxes: vec![
                HitBox {
                    rect: Rect::new(0, 0, 10, 10),
                    choice_index: 0,
                },
                HitBox {
                    rect: Rect::new(0, 10, 10, 10),
                    choice_index: 1,
                },
            ],
        };
        assert_eq!(table.hit_test(5, 9), Some(0));
        assert_eq!(table.hit_test(5, 10), Some(1));
        assert_eq!(table.hit_test(5, 20), None);
        assert_eq!(table.hit_test(-1, 5), None);
    }
}
