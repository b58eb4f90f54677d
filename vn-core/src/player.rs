//! # Player 模块
//!
//! 把解释器、布局、光栅化和过渡组合成一个可交互的播放器。
//! 编辑器预览和导出包运行的都是这一份实现。
//!
//! ## 帧循环
//!
//! ```text
//! on_click(x, y) -> 命中测试 -> 解释器推进 -> （可能）开始过渡
//! frame(now)     -> 过渡采样 / 重新布局 -> 就绪则光栅化，否则保留上一帧
//! ```
//!
//! 过渡期间解释器的逻辑位置对外不可见：跳转在克隆的解释器上执行以渲染目标画面，
//! 直到过渡终帧才提交；期间的点击直接丢弃。
//!
//! 核心不读时钟：`now` 是宿主提供的单调时间（任意起点的 [`Duration`]），
//! 桌面端可以取 `Instant::elapsed()`，浏览器端取 `performance.now()`。

use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::effect::{Effect, StageLayer};
use crate::error::{AssetError, VnResult};
use crate::project::Project;
use crate::render::{
    layout_frame, rasterize, stage_frame, AssetCatalog, AssetState, FixedMetrics, FrameDescriptor,
    LayerOpacity, LayoutInput, TextMetrics, ViewState,
};
use crate::runtime::Interpreter;
use crate::state::{StageState, WaitingReason};
use crate::transition::TransitionManager;

/// 点击处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// 过渡中或已结束，点击被丢弃
    Ignored,
    /// 有待选选项但没有命中
    Missed,
    /// 推进到下一条
    Advanced,
    /// 选中了选项
    Chose(usize),
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: u8,
    to: u8,
    started: Duration,
    duration: Duration,
}

impl Fade {
    /// 进行中返回当前不透明度，结束后返回 None
    fn sample(&self, now: Duration) -> Option<u8> {
        let elapsed = now.saturating_sub(self.started);
        if elapsed >= self.duration {
            return None;
        }
        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        let value = f32::from(self.from) + (f32::from(self.to) - f32::from(self.from)) * t;
        Some(value.round().clamp(0.0, 255.0) as u8)
    }
}

/// 图层淡入淡出与帧动画时钟
///
/// 记录每层最近的可见性，淡入淡出从画面上当前的不透明度开始。
#[derive(Debug, Clone, Copy)]
struct StageClock {
    background: Option<Fade>,
    character: Option<Fade>,
    background_visible: bool,
    character_visible: bool,
    animation_start: Option<Duration>,
}

impl Default for StageClock {
    fn default() -> Self {
        Self::for_stage(&StageState::default())
    }
}

impl StageClock {
    fn for_stage(stage: &StageState) -> Self {
        Self {
            background: None,
            character: None,
            background_visible: stage.background_visible,
            character_visible: stage.character_visible,
            animation_start: None,
        }
    }

    fn apply(&mut self, effect: &Effect, project: &Project, now: Duration) {
        match effect {
            Effect::SceneEntered { scene_index } => {
                *self = match project.scene(*scene_index) {
                    Ok(scene) => Self::for_stage(&StageState::for_scene(scene)),
                    Err(_) => Self::default(),
                };
            }
            Effect::Visibility(change) => {
                let (slot, visible) = match change.layer {
                    StageLayer::Background => (&mut self.background, &mut self.background_visible),
                    StageLayer::Character => (&mut self.character, &mut self.character_visible),
                };
                let to = if change.visible { 255 } else { 0 };
                let from = slot
                    .and_then(|f| f.sample(now))
                    .unwrap_or(if *visible { 255 } else { 0 });
                *visible = change.visible;
                *slot = (change.fade_ms > 0 && from != to).then(|| Fade {
                    from,
                    to,
                    started: now,
                    duration: Duration::from_millis(u64::from(change.fade_ms)),
                });
                if change.layer == StageLayer::Character && change.animation.is_some() {
                    self.animation_start = Some(now);
                }
            }
            _ => {}
        }
    }

    fn view(&self, show_scene_index: bool, now: Duration) -> ViewState {
        ViewState {
            show_scene_index,
            opacity: LayerOpacity {
                background: self.background.and_then(|f| f.sample(now)),
                character: self.character.and_then(|f| f.sample(now)),
            },
            animation_clock_ms: self
                .animation_start
                .map(|t| now.saturating_sub(t).as_millis() as u64)
                .unwrap_or(0),
        }
    }
}

/// 等待过渡结束才提交的跳转
#[derive(Debug)]
struct PendingJump {
    interpreter: Interpreter,
    effects: Vec<Effect>,
}

/// 播放器
#[derive(Debug)]
pub struct Player<M: TextMetrics = FixedMetrics> {
    project: Project,
    interpreter: Interpreter,
    metrics: M,
    show_scene_index: bool,
    clock: StageClock,
    /// 最近一帧完整布局（命中测试以它为准）
    last_frame: Option<FrameDescriptor>,
    last_image: Option<RgbaImage>,
    transitions: TransitionManager,
    pending: Option<PendingJump>,
    outbox: Vec<Effect>,
    started: bool,
}

impl Player<FixedMetrics> {
    /// 使用默认字体创建播放器
    pub fn new(project: Project) -> Self {
        Self::with_metrics(project, FixedMetrics::default())
    }
}

impl<M: TextMetrics> Player<M> {
    pub fn with_metrics(project: Project, metrics: M) -> Self {
        let interpreter = Interpreter::new(&project);
        Self {
            project,
            interpreter,
            metrics,
            show_scene_index: false,
            clock: StageClock::default(),
            last_frame: None,
            last_image: None,
            transitions: TransitionManager::new(),
            pending: None,
            outbox: Vec::new(),
            started: false,
        }
    }

    /// 显示场景编号（编辑器视图选项）
    pub fn set_show_scene_index(&mut self, show: bool) {
        self.show_scene_index = show;
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// 是否有过渡在进行
    pub fn in_transition(&self) -> bool {
        self.transitions.is_active()
    }

    /// 最近一帧完整布局
    pub fn last_frame(&self) -> Option<&FrameDescriptor> {
        self.last_frame.as_ref()
    }

    /// 取走累积的效果（音频等交给 Host）
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    /// 开始播放
    pub fn start(&mut self, assets: &impl AssetCatalog, now: Duration) -> VnResult<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let (effects, _) = self.interpreter.start(&self.project)?;
        self.after_tick(effects, assets, now)
    }

    /// 处理画布坐标上的点击
    pub fn on_click(
        &mut self,
        x: i32,
        y: i32,
        assets: &impl AssetCatalog,
        now: Duration,
    ) -> VnResult<ClickOutcome> {
        if self.transitions.is_active() || self.pending.is_some() {
            debug!(x, y, "过渡中，丢弃点击");
            return Ok(ClickOutcome::Ignored);
        }

        let (effects, outcome) = match self.interpreter.waiting().clone() {
            WaitingReason::WaitForChoice { .. } => {
                let hit = self
                    .last_frame
                    .as_ref()
                    .and_then(|frame| frame.hit_table.hit_test(x, y));
                match hit {
                    Some(index) => {
                        let (effects, _) = self.interpreter.resolve_choice(&self.project, index)?;
                        (effects, ClickOutcome::Chose(index))
                    }
                    None => return Ok(ClickOutcome::Missed),
                }
            }
            WaitingReason::WaitForClick => {
                let (effects, _) = self.interpreter.advance(&self.project)?;
                (effects, ClickOutcome::Advanced)
            }
            WaitingReason::None | WaitingReason::WaitForTransition { .. } => {
                return Ok(ClickOutcome::Ignored);
            }
        };

        self.after_tick(effects, assets, now)?;
        Ok(outcome)
    }

    /// 生成当前应显示的画面
    ///
    /// 过渡中返回合成帧；否则重新布局，全部图层就绪才光栅化，
    /// 未就绪时保留上一帧完整画面。
    pub fn frame(&mut self, assets: &impl AssetCatalog, now: Duration) -> VnResult<Option<&RgbaImage>> {
        if let Some(sample) = self.transitions.sample(now)? {
            if sample.finished {
                self.commit_jump(now);
            }
            self.last_image = Some(sample.image);
            if !sample.finished {
                return Ok(self.last_image.as_ref());
            }
        }

        let desc = self.layout(assets, now)?;
        if stage_frame(&desc, assets).is_ready() {
            self.last_image = Some(rasterize(&desc, assets, &self.metrics));
            self.last_frame = Some(desc);
        } else {
            debug!("图层未就绪，保留上一帧");
        }
        Ok(self.last_image.as_ref())
    }

    fn layout(&self, assets: &impl AssetCatalog, now: Duration) -> VnResult<FrameDescriptor> {
        let view = self.clock.view(self.show_scene_index, now);
        let input = LayoutInput::from_interpreter(&self.project, &self.interpreter, view)?;
        Ok(layout_frame(&input, assets, &self.metrics)?)
    }

    fn after_tick(&mut self, effects: Vec<Effect>, assets: &impl AssetCatalog, now: Duration) -> VnResult<()> {
        for effect in &effects {
            self.clock.apply(effect, &self.project, now);
        }
        self.outbox.extend(effects);

        if let WaitingReason::WaitForTransition { target_scene } = self.interpreter.waiting().clone() {
            self.begin_transition(target_scene, assets, now)?;
        }
        Ok(())
    }

    /// 在克隆的解释器上执行跳转并渲染目标画面，然后开始过渡
    fn begin_transition(&mut self, target_scene: usize, assets: &impl AssetCatalog, now: Duration) -> VnResult<()> {
        info!(from = self.interpreter.scene_index(), to = target_scene, "场景过渡");

        let old = match self.last_image.clone() {
            Some(image) => image,
            None => {
                let desc = self.layout(assets, now)?;
                rasterize(&desc, assets, &self.metrics)
            }
        };

        let mut target = self.interpreter.clone();
        let (effects, _) = target.finish_transition(&self.project)?;
        let mut target_clock = self.clock;
        for effect in &effects {
            target_clock.apply(effect, &self.project, now);
        }
        let input = LayoutInput::from_interpreter(
            &self.project,
            &target,
            target_clock.view(self.show_scene_index, now),
        )?;
        let desc = layout_frame(&input, assets, &self.metrics)?;
        let new = rasterize(&desc, assets, &self.metrics);

        let settings = &self.project.settings;
        let mask = settings.transition_image.as_deref().and_then(|handle| {
            match assets.image(handle) {
                AssetState::Ready(image) => Some(image.clone()),
                AssetState::Pending => None,
                AssetState::Failed(message) => {
                    let error = AssetError::AssetLoadFailure {
                        handle: handle.to_string(),
                        message: message.to_string(),
                    };
                    warn!(error = %error, "过渡遮罩不可用，直接切换");
                    None
                }
            }
        });

        self.transitions.start(
            old,
            new,
            mask,
            Duration::from_millis(settings.transition_duration_ms),
            now,
        )?;
        self.pending = Some(PendingJump {
            interpreter: target,
            effects,
        });
        Ok(())
    }

    /// 过渡终帧：提交克隆解释器上的跳转
    fn commit_jump(&mut self, now: Duration) {
        if let Some(jump) = self.pending.take() {
            for effect in &jump.effects {
                self.clock.apply(effect, &self.project, now);
            }
            self.interpreter = jump.interpreter;
            self.outbox.extend(jump.effects);
            debug!(scene = self.interpreter.scene_index(), "过渡提交");
        }
    }
}
