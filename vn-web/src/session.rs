//! 浏览器会话
//!
//! 与 wasm-bindgen 无关的部分放在这里，可以在本机直接测试。

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use vn_core::{
    AssetStore, ClickOutcome, Effect, Player, Project, VnError, screen_to_canvas,
};

/// 点击结果编码：未处理
pub const CLICK_IGNORED: i32 = -3;
/// 点击结果编码：有选项但没有命中
pub const CLICK_MISSED: i32 = -2;
/// 点击结果编码：推进到下一条
pub const CLICK_ADVANCED: i32 = -1;

#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Core(#[from] VnError),

    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 把 `performance.now()` 的毫秒数换算为核心使用的单调时间
///
/// 非有限值与负数按 0 处理。
pub fn host_time(now_ms: f64) -> Duration {
    if !now_ms.is_finite() || now_ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(now_ms / 1000.0).unwrap_or(Duration::MAX)
}

/// [`ClickOutcome`] 到整数编码：非负数是选中的选项下标
pub fn click_code(outcome: ClickOutcome) -> i32 {
    match outcome {
        ClickOutcome::Ignored => CLICK_IGNORED,
        ClickOutcome::Missed => CLICK_MISSED,
        ClickOutcome::Advanced => CLICK_ADVANCED,
        ClickOutcome::Chose(index) => i32::try_from(index).unwrap_or(i32::MAX),
    }
}

/// 一次页面生命周期内的播放状态
pub struct Session {
    player: Player,
    assets: AssetStore,
    /// 需要页面自行获取的图片：(句柄, 来源)
    external: Vec<(String, String)>,
}

impl Session {
    /// 解析工程并解码内嵌资源；外部资源标记为加载中
    pub fn from_json(json: &str) -> Result<Self, WebError> {
        let project = Project::from_json(json).map_err(VnError::from)?;
        let mut assets = AssetStore::new();

        let mut external = Vec::new();
        for reference in assets.load_embedded(&project) {
            if let Some(source) = reference.image_source(&project) {
                external.push((reference.handle.clone(), source.to_string()));
            }
        }
        for (handle, _) in &external {
            assets.mark_pending(handle.as_str());
        }

        info!(
            scenes = project.scenes.len(),
            external = external.len(),
            "工程已加载"
        );
        Ok(Self {
            player: Player::new(project),
            assets,
            external,
        })
    }

    pub fn width(&self) -> u32 {
        self.player.project().width()
    }

    pub fn height(&self) -> u32 {
        self.player.project().height()
    }

    /// 外部图片列表，JSON 形如 `[["hero", "img/hero.png"], ...]`
    pub fn external_assets_json(&self) -> Result<String, WebError> {
        Ok(serde_json::to_string(&self.external)?)
    }

    /// 放入页面获取到的图片字节
    ///
    /// 解码失败时句柄记为失败，画面降级为占位图形，不向页面报错。
    pub fn load_image(&mut self, handle: &str, bytes: &[u8]) {
        if let Err(error) = self.assets.load_encoded(handle, bytes) {
            debug!(handle, error = %error, "图片解码失败");
        }
    }

    pub fn mark_failed(&mut self, handle: &str, message: &str) {
        self.assets.mark_failed(handle, message);
    }

    pub fn start(&mut self, now: Duration) -> Result<(), WebError> {
        Ok(self.player.start(&self.assets, now)?)
    }

    /// 处理页面坐标上的点击
    pub fn click(
        &mut self,
        screen_x: f32,
        screen_y: f32,
        scale: u32,
        now: Duration,
    ) -> Result<ClickOutcome, WebError> {
        let (x, y) = screen_to_canvas(screen_x, screen_y, scale);
        Ok(self.player.on_click(x, y, &self.assets, now)?)
    }

    /// 当前画面的 RGBA 像素，行优先
    pub fn frame(&mut self, now: Duration) -> Result<Option<&[u8]>, WebError> {
        let image = self.player.frame(&self.assets, now)?;
        Ok(image.map(|image| image.as_raw().as_slice()))
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.player.take_effects()
    }

    pub fn take_effects_json(&mut self) -> Result<String, WebError> {
        Ok(serde_json::to_string(&self.take_effects())?)
    }
}
