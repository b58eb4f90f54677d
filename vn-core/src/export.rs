//! # Export 模块
//!
//! 把工程打包成单个可离线打开的 HTML 文件。
//!
//! 产物结构：
//!
//! ```text
//! <canvas id="vn-canvas">                      resolution × scale，像素化缩放
//! <script type="application/json" id="vn-project">   工程 JSON
//! <script type="application/wasm" id="vn-runtime">   base64 编码的运行时
//! <script>                                     加载器
//! ```
//!
//! 运行时由 `vn-web` 构建（`cargo xtask build-web`）：`loader.js` 读取上面两个
//! script 标签，实例化 wasm 后驱动 `WebPlayer`。这里只负责拼装。

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tracing::info;

use crate::project::Project;

/// 导出错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    /// 工程序列化失败
    #[error("工程序列化失败: {0}")]
    Serialize(String),

    /// 运行时 wasm 为空
    #[error("运行时 wasm 为空，无法导出")]
    EmptyRuntime,

    /// 缩放倍数为 0
    #[error("缩放倍数必须大于 0")]
    InvalidScale,
}

/// 预先构建好的运行时
#[derive(Debug, Clone, Default)]
pub struct RuntimeBundle {
    /// 加载器脚本，负责实例化 wasm 并绑定画布
    pub loader_js: String,
    /// 运行时 wasm 字节
    pub wasm: Vec<u8>,
}

/// 导出选项
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// 覆盖工程设置中的缩放倍数
    pub scale: Option<u32>,
}

/// 生成单文件 HTML
pub fn export_html(
    project: &Project,
    runtime: &RuntimeBundle,
    options: &ExportOptions,
) -> Result<String, ExportError> {
    if runtime.wasm.is_empty() {
        return Err(ExportError::EmptyRuntime);
    }
    let scale = options.scale.unwrap_or(project.settings.scale);
    if scale == 0 {
        return Err(ExportError::InvalidScale);
    }

    let json = serde_json::to_string(project).map_err(|e| ExportError::Serialize(e.to_string()))?;
    let wasm = STANDARD.encode(&runtime.wasm);
    let (width, height) = (project.width(), project.height());
    let title = escape_html(&project.title);

    let mut html = String::with_capacity(json.len() + wasm.len() + runtime.loader_js.len() + 1024);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n"));
    html.push_str(
        "<style>\nhtml,body{margin:0;height:100%;background:#000;}\n\
         body{display:flex;align-items:center;justify-content:center;}\n\
         canvas{image-rendering:pixelated;image-rendering:crisp-edges;}\n</style>\n",
    );
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<canvas id=\"vn-canvas\" width=\"{width}\" height=\"{height}\" \
         style=\"width:{}px;height:{}px\"></canvas>\n",
        width * scale,
        height * scale,
    ));
    html.push_str("<script type=\"application/json\" id=\"vn-project\">");
    html.push_str(&escape_script(&json));
    html.push_str("</script>\n");
    html.push_str("<script type=\"application/wasm\" id=\"vn-runtime\">");
    html.push_str(&wasm);
    html.push_str("</script>\n<script>\n");
    html.push_str(&escape_script(&runtime.loader_js));
    html.push_str("\n</script>\n</body>\n</html>\n");

    info!(
        title = %project.title,
        scenes = project.scenes.len(),
        wasm_bytes = runtime.wasm.len(),
        html_bytes = html.len(),
        "导出 HTML"
    );
    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// 防止内容提前闭合 `<script>`
fn escape_script(text: &str) -> String {
    text.replace("</", "<\\/")
}
