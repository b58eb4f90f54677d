//! 按词换行
//!
//! - 显式换行符开始新段落
//! - 按度量宽度贪心填充
//! - 单个超宽的词独占一行，不拆分
//! - 换行结果再次换行不变

use super::metrics::TextMetrics;

/// 把文本按 `budget` 像素宽度换行
pub fn wrap_text(text: &str, budget: u32, metrics: &impl TextMetrics) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, budget, metrics, &mut lines);
    }
    lines
}

fn wrap_paragraph(paragraph: &str, budget: u32, metrics: &impl TextMetrics, lines: &mut Vec<String>) {
    let mut current = String::new();

    for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate_width = metrics.measure(&current) + metrics.measure(" ") + metrics.measure(word);
        if candidate_width <= budget {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    lines.push(current);
}
