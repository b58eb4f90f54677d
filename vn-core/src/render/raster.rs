//! CPU 光栅化
//!
//! 严格按绘制列表顺序把每个操作以 "over" 混合到不透明画布上。
//! 图片采用最近邻缩放，保证像素风格。

use image::{Rgba as Pixel, RgbaImage};

use super::assets::{AssetCatalog, AssetState};
use super::metrics::TextMetrics;
use super::nine_slice::{slices, validate_skin};
use super::{DrawOp, FrameDescriptor, Rect, Rgba};

/// 把布局结果光栅化为图片
///
/// 尚未就绪或已失败的图片被跳过；调用方应先用 `stage_frame` 确认就绪。
pub fn rasterize(
    desc: &FrameDescriptor,
    assets: &impl AssetCatalog,
    metrics: &impl TextMetrics,
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(desc.width, desc.height, Pixel(Rgba::BLACK.0));

    for call in &desc.calls {
        match &call.op {
            DrawOp::Fill { rect, color } => fill(&mut canvas, *rect, *color),
            DrawOp::Image {
                handle,
                src,
                dest,
                opacity,
            } => {
                if let AssetState::Ready(image) = assets.image(handle) {
                    blit(&mut canvas, image, *src, *dest, *opacity);
                }
            }
            DrawOp::NineSlice { handle, dest } => {
                if let AssetState::Ready(image) = assets.image(handle) {
                    if validate_skin(handle, image).is_ok() {
                        for (src, dst) in slices(*dest) {
                            blit(&mut canvas, image, src, dst, 255);
                        }
                    }
                }
            }
            DrawOp::Text { text, x, y, color } => draw_text(&mut canvas, text, *x, *y, *color, metrics),
            DrawOp::AdvanceArrow { x, y, color } => {
                // 7×4 向下三角形
                for row in 0..4 {
                    fill(&mut canvas, Rect::new(x + row, y + row, (7 - 2 * row) as u32, 1), *color);
                }
            }
        }
    }
    canvas
}

/// 直通 alpha 的 "over" 混合，`opacity` 额外乘到源 alpha 上
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: u8) -> [u8; 4] {
    let sa = mul_div255(u16::from(src[3]), u16::from(opacity));
    if sa == 0 {
        return dst;
    }
    let inv = 255 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..3 {
        out[i] = mul_div255(u16::from(src[i]), u16::from(sa))
            .saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u8
}

fn put(canvas: &mut RgbaImage, x: i32, y: i32, color: [u8; 4], opacity: u8) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let px = canvas.get_pixel_mut(x as u32, y as u32);
    px.0 = over(px.0, color, opacity);
}

fn bounds(canvas: &RgbaImage) -> Rect {
    Rect::new(0, 0, canvas.width(), canvas.height())
}

fn fill(canvas: &mut RgbaImage, rect: Rect, color: Rgba) {
    let Some(clip) = rect.intersect(bounds(canvas)) else {
        return;
    };
    for y in clip.y..clip.bottom() {
        for x in clip.x..clip.right() {
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            px.0 = over(px.0, color.0, 255);
        }
    }
}

/// 最近邻缩放绘制 `src` 区域到 `dest`
fn blit(canvas: &mut RgbaImage, image: &RgbaImage, src: Rect, dest: Rect, opacity: u8) {
    if src.width == 0 || src.height == 0 {
        return;
    }
    let Some(clip) = dest.intersect(bounds(canvas)) else {
        return;
    };
    let (iw, ih) = image.dimensions();
    let rows = (clip.y - dest.y) as u32..(clip.bottom() - dest.y) as u32;
    let cols = (clip.x - dest.x) as u32..(clip.right() - dest.x) as u32;
    for dy in rows {
        let sy = src.y as i64 + (u64::from(dy) * u64::from(src.height) / u64::from(dest.height)) as i64;
        if sy < 0 || sy >= i64::from(ih) {
            continue;
        }
        for dx in cols.clone() {
            let sx = src.x as i64 + (u64::from(dx) * u64::from(src.width) / u64::from(dest.width)) as i64;
            if sx < 0 || sx >= i64::from(iw) {
                continue;
            }
            let color = image.get_pixel(sx as u32, sy as u32).0;
            put(canvas, dest.x + dx as i32, dest.y + dy as i32, color, opacity);
        }
    }
}

fn draw_text(
    canvas: &mut RgbaImage,
    text: &str,
    x: i32,
    y: i32,
    color: Rgba,
    metrics: &impl TextMetrics,
) {
    let mut pen_x = x;
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        if let Some(glyph) = metrics.glyph(ch) {
            for gy in 0..glyph.height {
                for gx in 0..glyph.width {
                    if glyph.covered(gx, gy) {
                        put(canvas, pen_x + gx as i32, y + glyph.offset_y + gy as i32, color.0, 255);
                    }
                }
            }
        }
        pen_x += metrics.measure(ch.encode_utf8(&mut buf)) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{AssetStore, DrawCall, FixedMetrics, Layer};

    fn desc(calls: Vec<DrawOp>) -> FrameDescriptor {
        FrameDescriptor {
            width: 16,
            height: 8,
            calls: calls
                .into_iter()
                .map(|op| DrawCall {
                    layer: Layer::Background,
                    op,
                })
                .collect(),
            ..FrameDescriptor::default()
        }
    }

    #[test]
    fn test_over() {
        assert_eq!(over([1, 2, 3, 255], [200, 200, 200, 0], 255), [1, 2, 3, 255]);
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255], 255), [255, 0, 0, 255]);
        assert_eq!(over([0, 0, 0, 255], [255, 255, 255, 255], 0), [0, 0, 0, 255]);
        let half = over([0, 0, 0, 255], [255, 255, 255, 255], 128);
        assert_eq!(half, [128, 128, 128, 255]);
    }

    #[test]
    fn test_later_ops_paint_over_earlier() {
        let d = desc(vec![
            DrawOp::Fill {
                rect: Rect::new(0, 0, 16, 8),
                color: Rgba([10, 20, 30, 255]),
            },
            DrawOp::Fill {
                rect: Rect::new(4, 0, 4, 8),
                color: Rgba([200, 0, 0, 255]),
            },
        ]);
        let img = rasterize(&d, &AssetStore::new(), &FixedMetrics::default());
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
        assert_eq!(img.get_pixel(5, 3).0, [200, 0, 0, 255]);
        assert_eq!(img.get_pixel(8, 3).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_nearest_neighbour_scaling() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Pixel([255, 0, 0, 255]));
        src.put_pixel(1, 0, Pixel([0, 0, 255, 255]));
        let mut assets = AssetStore::new();
        assets.insert("img", src);

        let d = desc(vec![DrawOp::Image {
            handle: "img".to_string(),
            src: Rect::new(0, 0, 2, 1),
            dest: Rect::new(0, 0, 16, 8),
            opacity: 255,
        }]);
        let img = rasterize(&d, &assets, &FixedMetrics::default());
        assert_eq!(img.get_pixel(7, 7).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(8, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_missing_image_is_skipped() {
        let d = desc(vec![DrawOp::Image {
            handle: "nope".to_string(),
            src: Rect::new(0, 0, 1, 1),
            dest: Rect::new(0, 0, 16, 8),
            opacity: 255,
        }]);
        let img = rasterize(&d, &AssetStore::new(), &FixedMetrics::default());
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_fill_far_outside_canvas_is_clipped() {
        let d = desc(vec![
            DrawOp::Fill {
                rect: Rect::new(-1_000_000, -1_000_000, 2_000_000, 1_000_004),
                color: Rgba::WHITE,
            },
            DrawOp::Fill {
                rect: Rect::new(100, 100, 50, 50),
                color: Rgba([255, 0, 0, 255]),
            },
        ]);
        let img = rasterize(&d, &AssetStore::new(), &FixedMetrics::default());
        assert_eq!(img.get_pixel(15, 3).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(0, 4).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_image_partly_off_canvas() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Pixel([255, 0, 0, 255]));
        src.put_pixel(1, 0, Pixel([0, 0, 255, 255]));
        let mut assets = AssetStore::new();
        assets.insert("img", src);

        // 左半边在画布外，只剩蓝色半边
        let d = desc(vec![DrawOp::Image {
            handle: "img".to_string(),
            src: Rect::new(0, 0, 2, 1),
            dest: Rect::new(-8, 0, 16, 8),
            opacity: 255,
        }]);
        let img = rasterize(&d, &assets, &FixedMetrics::default());
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(7, 7).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(8, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_arrow_shape() {
        let d = desc(vec![DrawOp::AdvanceArrow {
            x: 0,
            y: 0,
            color: Rgba::WHITE,
        }]);
        let img = rasterize(&d, &AssetStore::new(), &FixedMetrics::default());
        let white = |x, y| img.get_pixel(x, y).0 == [255, 255, 255, 255];
        assert!((0..7).all(|x| white(x, 0)));
        assert!(white(3, 3) && !white(2, 3) && !white(4, 3));
        assert!(!white(3, 4));
    }
}
