//! 文本度量
//!
//! 布局只依赖度量接口；默认字体是等宽方块字形，自定义字体由 Host 提供实现。

/// 单个字形位图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub width: u32,
    pub height: u32,
    /// 相对行框顶部的纵向偏移
    pub offset_y: i32,
    /// 行优先的覆盖位
    pub bits: Vec<bool>,
}

impl Glyph {
    /// 实心矩形字形
    pub fn solid(width: u32, height: u32, offset_y: i32) -> Self {
        Self {
            width,
            height,
            offset_y,
            bits: vec![true; (width * height) as usize],
        }
    }

    pub fn covered(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }
}

/// 文本度量接口
pub trait TextMetrics {
    /// 文本宽度（像素）
    fn measure(&self, text: &str) -> u32;

    /// 行高（像素）
    fn line_height(&self) -> u32;

    /// 字符字形，空白字符返回 None
    fn glyph(&self, _ch: char) -> Option<Glyph> {
        None
    }
}

/// 默认等宽字体
#[derive(Debug, Clone, Copy)]
pub struct FixedMetrics {
    pub advance: u32,
    pub line_height: u32,
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self {
            advance: 6,
            line_height: 12,
        }
    }
}

impl TextMetrics for FixedMetrics {
    fn measure(&self, text: &str) -> u32 {
        text.chars().count() as u32 * self.advance
    }

    fn line_height(&self) -> u32 {
        self.line_height
    }

    fn glyph(&self, ch: char) -> Option<Glyph> {
        if ch.is_whitespace() {
            return None;
        }
        let width = self.advance.saturating_sub(1).max(1);
        let height = self.line_height.saturating_sub(4).max(1);
        Some(Glyph::solid(width, height, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_metrics() {
        let m = FixedMetrics::default();
        assert_eq!(m.measure("abc"), 18);
        assert_eq!(m.measure("你好"), 12);
        assert_eq!(m.line_height(), 12);
        assert!(m.glyph(' ').is_none());
        let g = m.glyph('a').unwrap();
        assert_eq!((g.width, g.height, g.offset_y), (5, 8, 2));
        assert!(g.covered(4, 7));
        assert!(!g.covered(5, 0));
    }
}
