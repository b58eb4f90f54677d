//! # Transition 模块
//!
//! 渐变遮罩擦除过渡。
//!
//! 遮罩图的红色通道作为亮度；进度 `p` 时亮度低于阈值的像素显示新画面，其余显示旧画面。
//! 没有混合，每个像素非新即旧，因此预览和导出逐像素一致。

use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, info};

/// 过渡错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// 新旧画面尺寸不同
    #[error("过渡画面尺寸不一致: 旧画面 {old_width}×{old_height}，新画面 {new_width}×{new_height}")]
    FrameSizeMismatch {
        old_width: u32,
        old_height: u32,
        new_width: u32,
        new_height: u32,
    },

    /// 已有过渡在进行（不支持取消或叠加）
    #[error("已有过渡正在进行")]
    AlreadyActive,
}

/// 进度对应的亮度阈值，取值 0..=256
///
/// `p = 0` 时没有像素切换，`p = 1` 时全部切换。
pub fn threshold(progress: f32) -> u16 {
    let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    (p * 256.0).floor() as u16
}

fn check_sizes(old: &RgbaImage, new: &RgbaImage) -> Result<(), TransitionError> {
    if old.dimensions() == new.dimensions() {
        Ok(())
    } else {
        Err(TransitionError::FrameSizeMismatch {
            old_width: old.width(),
            old_height: old.height(),
            new_width: new.width(),
            new_height: new.height(),
        })
    }
}

/// 合成一帧过渡画面
///
/// 遮罩尺寸与画面不同时按最近邻采样；没有遮罩时直接切到新画面。
pub fn composite(
    old: &RgbaImage,
    new: &RgbaImage,
    mask: Option<&RgbaImage>,
    progress: f32,
) -> Result<RgbaImage, TransitionError> {
    check_sizes(old, new)?;
    let Some(mask) = mask.filter(|m| m.width() > 0 && m.height() > 0) else {
        return Ok(new.clone());
    };

    let (width, height) = old.dimensions();
    let (mw, mh) = mask.dimensions();
    let t = threshold(progress);

    let mut out = old.clone();
    for y in 0..height {
        let my = (u64::from(y) * u64::from(mh) / u64::from(height)) as u32;
        for x in 0..width {
            let mx = (u64::from(x) * u64::from(mw) / u64::from(width)) as u32;
            let luminance = u16::from(mask.get_pixel(mx, my).0[0]);
            if luminance < t {
                out.put_pixel(x, y, *new.get_pixel(x, y));
            }
        }
    }
    Ok(out)
}

/// 过渡采样结果
#[derive(Debug, Clone)]
pub struct TransitionFrame {
    pub image: RgbaImage,
    pub progress: f32,
    /// 终帧（此后管理器空闲）
    pub finished: bool,
}

#[derive(Debug)]
struct ActiveTransition {
    old: RgbaImage,
    new: RgbaImage,
    mask: Option<RgbaImage>,
    duration: Duration,
    started: Duration,
}

/// 过渡动画管理器
///
/// 进度由宿主传入的单调时钟（任意起点的 `Duration`）决定，每个动画帧采样一次。
/// 过渡开始后必定运行到结束。
#[derive(Debug, Default)]
pub struct TransitionManager {
    active: Option<ActiveTransition>,
}

impl TransitionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始过渡
    ///
    /// 没有遮罩时时长视为 0，下一次采样即为终帧。
    pub fn start(
        &mut self,
        old: RgbaImage,
        new: RgbaImage,
        mask: Option<RgbaImage>,
        duration: Duration,
        now: Duration,
    ) -> Result<(), TransitionError> {
        if self.active.is_some() {
            return Err(TransitionError::AlreadyActive);
        }
        check_sizes(&old, &new)?;
        let duration = if mask.is_some() { duration } else { Duration::ZERO };
        info!(duration_ms = duration.as_millis() as u64, masked = mask.is_some(), "开始过渡");
        self.active = Some(ActiveTransition {
            old,
            new,
            mask,
            duration,
            started: now,
        });
        Ok(())
    }

    /// 是否有过渡在进行
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// 当前进度 [0, 1]
    pub fn progress(&self, now: Duration) -> Option<f32> {
        self.active.as_ref().map(|t| progress_at(t, now))
    }

    /// 采样当前帧；没有过渡时返回 None
    pub fn sample(&mut self, now: Duration) -> Result<Option<TransitionFrame>, TransitionError> {
        let Some(active) = self.active.as_ref() else {
            return Ok(None);
        };
        let progress = progress_at(active, now);
        if progress >= 1.0 {
            let Some(done) = self.active.take() else {
                return Ok(None);
            };
            debug!("过渡结束");
            return Ok(Some(TransitionFrame {
                image: done.new,
                progress: 1.0,
                finished: true,
            }));
        }

        let image = composite(&active.old, &active.new, active.mask.as_ref(), progress)?;
        Ok(Some(TransitionFrame {
            image,
            progress,
            finished: false,
        }))
    }
}

fn progress_at(transition: &ActiveTransition, now: Duration) -> f32 {
    if transition.duration.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_sub(transition.started);
    (elapsed.as_secs_f32() / transition.duration.as_secs_f32()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const OLD: [u8; 4] = [255, 0, 0, 255];
    const NEW: [u8; 4] = [0, 0, 255, 255];

    /// 每列亮度等于列号的 256×1 遮罩
    fn ramp_mask() -> RgbaImage {
        RgbaImage::from_fn(256, 1, |x, _| Rgba([x as u8, 0, 0, 255]))
    }

    fn frames() -> (RgbaImage, RgbaImage) {
        (
            RgbaImage::from_pixel(256, 2, Rgba(OLD)),
            RgbaImage::from_pixel(256, 2, Rgba(NEW)),
        )
    }

    #[test]
    fn test_threshold_bounds() {
        assert_eq!(threshold(0.0), 0);
        assert_eq!(threshold(0.5), 128);
        assert_eq!(threshold(1.0), 256);
        assert_eq!(threshold(-3.0), 0);
        assert_eq!(threshold(7.0), 256);
        assert_eq!(threshold(f32::NAN), 0);
    }

    #[test]
    fn test_wipe_endpoints_and_midpoint() {
        let (old, new) = frames();
        let mask = ramp_mask();

        let start = composite(&old, &new, Some(&mask), 0.0).unwrap();
        assert!(start.pixels().all(|p| p.0 == OLD));

        let end = composite(&old, &new, Some(&mask), 1.0).unwrap();
        assert!(end.pixels().all(|p| p.0 == NEW));

        let mid = composite(&old, &new, Some(&mask), 0.5).unwrap();
        for x in 0..256 {
            let expected = if x < 128 { NEW } else { OLD };
            assert_eq!(mid.get_pixel(x, 1).0, expected, "x = {x}");
        }
    }

    #[test]
    fn test_mask_is_sampled_nearest_neighbour() {
        let (old, new) = frames();
        // 2×1 遮罩：左半黑，右半白
        let mut mask = RgbaImage::new(2, 1);
        mask.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        mask.put_pixel(1, 0, Rgba([255, 255, 255, 255]));

        let out = composite(&old, &new, Some(&mask), 0.1).unwrap();
        assert_eq!(out.get_pixel(127, 0).0, NEW);
        assert_eq!(out.get_pixel(128, 0).0, OLD);
    }

    #[test]
    fn test_no_mask_cuts_to_new() {
        let (old, new) = frames();
        assert_eq!(composite(&old, &new, None, 0.0).unwrap(), new);
    }

    #[test]
    fn test_size_mismatch() {
        let old = RgbaImage::new(4, 4);
        let new = RgbaImage::new(4, 5);
        assert!(matches!(
            composite(&old, &new, None, 0.5),
            Err(TransitionError::FrameSizeMismatch { new_height: 5, .. })
        ));
    }

    #[test]
    fn test_manager_runs_to_completion() {
        let (old, new) = frames();
        let t0 = Duration::from_secs(3);
        let mut manager = TransitionManager::new();
        manager
            .start(old.clone(), new.clone(), Some(ramp_mask()), Duration::from_millis(800), t0)
            .unwrap();
        assert!(manager.is_active());
        assert_eq!(
            manager.start(old, new.clone(), None, Duration::ZERO, t0),
            Err(TransitionError::AlreadyActive)
        );

        let half = manager.sample(t0 + Duration::from_millis(400)).unwrap().unwrap();
        assert!(!half.finished);
        assert!((half.progress - 0.5).abs() < 1e-6);
        assert_eq!(half.image.get_pixel(0, 0).0, NEW);
        assert_eq!(half.image.get_pixel(255, 0).0, OLD);

        let done = manager.sample(t0 + Duration::from_millis(900)).unwrap().unwrap();
        assert!(done.finished);
        assert_eq!(done.image, new);
        assert!(!manager.is_active());
        assert!(manager.sample(t0).unwrap().is_none());
    }

    #[test]
    fn test_manager_without_mask_finishes_immediately() {
        let (old, new) = frames();
        let t0 = Duration::from_secs(3);
        let mut manager = TransitionManager::new();
        manager
            .start(old, new, None, Duration::from_millis(800), t0)
            .unwrap();
        let frame = manager.sample(t0).unwrap().unwrap();
        assert!(frame.finished);
    }
}
