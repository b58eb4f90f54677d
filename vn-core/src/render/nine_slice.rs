//! 九宫格切片
//!
//! 皮肤源图固定 16×16：四角 5px 原样绘制，中间 6px 条带拉伸。

use image::RgbaImage;

use super::Rect;
use crate::error::AssetError;

/// 源图边长
pub const SKIN_SIZE: u32 = 16;
/// 角块边长
pub const CORNER: u32 = 5;
/// 可拉伸条带宽度
pub const BAND: u32 = SKIN_SIZE - 2 * CORNER;

/// 校验皮肤尺寸
pub fn validate_skin(handle: &str, image: &RgbaImage) -> Result<(), AssetError> {
    let (width, height) = image.dimensions();
    if width == SKIN_SIZE && height == SKIN_SIZE {
        Ok(())
    } else {
        Err(AssetError::MalformedNinePatchAsset {
            handle: handle.to_string(),
            width,
            height,
        })
    }
}

/// 计算九个切片的 (源矩形, 目标矩形)
///
/// 顺序：上排左中右、中排左中右、下排左中右。
/// 目标小于两个角块时中间切片宽/高为 0。
pub fn slices(dest: Rect) -> [(Rect, Rect); 9] {
    let c = CORNER as i32;
    let mid_w = dest.width.saturating_sub(2 * CORNER);
    let mid_h = dest.height.saturating_sub(2 * CORNER);

    let src_cols = [(0, CORNER), (c, BAND), (c + BAND as i32, CORNER)];
    let dst_cols = [
        (dest.x, CORNER.min(dest.width)),
        (dest.x + c, mid_w),
        (dest.right() - c, CORNER.min(dest.width)),
    ];
    let src_rows = src_cols;
    let dst_rows = [
        (dest.y, CORNER.min(dest.height)),
        (dest.y + c, mid_h),
        (dest.bottom() - c, CORNER.min(dest.height)),
    ];

    let mut out = [(Rect::default(), Rect::default()); 9];
    for row in 0..3 {
        for col in 0..3 {
            let (sx, sw) = src_cols[col];
            let (sy, sh) = src_rows[row];
            let (dx, dw) = dst_cols[col];
            let (dy, dh) = dst_rows[row];
            out[row * 3 + col] = (Rect::new(sx, sy, sw, sh), Rect::new(dx, dy, dw, dh));
        }
    }
    out
}
