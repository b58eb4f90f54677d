//! # VN Web
//!
//! 导出 HTML 的浏览器宿主：把 [`vn_core::Player`] 以 wasm-bindgen 接口交给页面脚本。
//!
//! ## 加载器约定
//!
//! `cargo xtask build-web` 用 `wasm-bindgen --target no-modules` 生成胶水代码，
//! 再把 `bootstrap.js` 接在后面得到 `loader.js`。导出时：
//!
//! - `#vn-runtime`：base64 编码的 `vn_web_bg.wasm`
//! - `#vn-project`：工程 JSON
//! - `#vn-canvas`：画布，尺寸为工程分辨率
//!
//! 时间一律是 `performance.now()` 的毫秒数。

mod session;

pub use session::{
    CLICK_ADVANCED, CLICK_IGNORED, CLICK_MISSED, Session, WebError, click_code, host_time,
};

use js_sys::Uint8ClampedArray;
use wasm_bindgen::prelude::*;

/// 页面持有的播放器
#[wasm_bindgen]
pub struct WebPlayer {
    session: Session,
}

#[wasm_bindgen]
impl WebPlayer {
    #[wasm_bindgen(constructor)]
    pub fn new(project_json: &str) -> Result<WebPlayer, JsError> {
        let session = Session::from_json(project_json).map_err(to_js)?;
        Ok(Self { session })
    }

    pub fn width(&self) -> u32 {
        self.session.width()
    }

    pub fn height(&self) -> u32 {
        self.session.height()
    }

    /// 页面需要自行获取的图片，JSON `[[handle, source], ...]`
    #[wasm_bindgen(js_name = externalAssets)]
    pub fn external_assets(&self) -> Result<String, JsError> {
        self.session.external_assets_json().map_err(to_js)
    }

    #[wasm_bindgen(js_name = loadImage)]
    pub fn load_image(&mut self, handle: &str, bytes: &[u8]) {
        self.session.load_image(handle, bytes);
    }

    #[wasm_bindgen(js_name = markFailed)]
    pub fn mark_failed(&mut self, handle: &str, message: &str) {
        self.session.mark_failed(handle, message);
    }

    pub fn start(&mut self, now_ms: f64) -> Result<(), JsError> {
        self.session.start(host_time(now_ms)).map_err(to_js)
    }

    /// 处理点击，返回值见 `CLICK_*`；非负数是选中的选项下标
    pub fn click(
        &mut self,
        screen_x: f32,
        screen_y: f32,
        scale: u32,
        now_ms: f64,
    ) -> Result<i32, JsError> {
        self.session
            .click(screen_x, screen_y, scale, host_time(now_ms))
            .map(click_code)
            .map_err(to_js)
    }

    /// 当前画面的 RGBA 像素；没有完整画面时返回 `undefined`
    pub fn frame(&mut self, now_ms: f64) -> Result<Option<Uint8ClampedArray>, JsError> {
        let pixels = self.session.frame(host_time(now_ms)).map_err(to_js)?;
        Ok(pixels.map(Uint8ClampedArray::from))
    }

    /// 取出累积的效果（对话、音频等），JSON 数组
    #[wasm_bindgen(js_name = takeEffects)]
    pub fn take_effects(&mut self) -> Result<String, JsError> {
        self.session.take_effects_json().map_err(to_js)
    }
}

fn to_js(error: WebError) -> JsError {
    JsError::new(&error.to_string())
}
