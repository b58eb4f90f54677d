//! 无头播放
//!
//! 用模拟时钟驱动 [`Player`]：每帧输出一张 PNG，等待点击时自动点击，
//! 遇到选项时按 `--choose` 给出的顺序点击对应选项的命中框。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, bail};
use tracing::{info, warn};
use vn_core::{AudioPort, Player, Project, SaveData, WaitingReason, dispatch_audio};

use crate::assets::load_images;
use crate::config::AppConfig;

/// 播放选项
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub choices: Vec<usize>,
    pub max_frames: usize,
    pub save: Option<PathBuf>,
}

/// 只记录日志的音频端口
#[derive(Debug, Default)]
struct LogAudioPort {
    dispatched: usize,
}

impl AudioPort for LogAudioPort {
    fn play_bgm(&mut self, source: &str, volume: u8, pitch: u16) {
        self.dispatched += 1;
        info!(source, volume, pitch, "BGM 播放");
    }

    fn stop_bgm(&mut self) {
        self.dispatched += 1;
        info!("BGM 停止");
    }

    fn fade_bgm(&mut self, target_volume: u8, duration_ms: u32) {
        self.dispatched += 1;
        info!(target_volume, duration_ms, "BGM 渐变");
    }

    fn play_bgs(&mut self, source: &str, volume: u8, pitch: u16) {
        self.dispatched += 1;
        info!(source, volume, pitch, "BGS 播放");
    }

    fn stop_bgs(&mut self) {
        self.dispatched += 1;
        info!("BGS 停止");
    }

    fn fade_bgs(&mut self, target_volume: u8, duration_ms: u32) {
        self.dispatched += 1;
        info!(target_volume, duration_ms, "BGS 渐变");
    }

    fn play_sfx(&mut self, source: &str, volume: u8, pitch: u16, pan: i16) {
        self.dispatched += 1;
        info!(source, volume, pitch, pan, "音效");
    }
}

/// 运行无头播放，直到脚本结束或达到帧数上限
pub fn run(project: Project, config: &AppConfig, options: &PlayOptions) -> anyhow::Result<()> {
    let assets = load_images(&project, &config.assets_dir);
    fs::create_dir_all(&config.frames_dir)
        .with_context(|| format!("创建帧目录失败: {}", config.frames_dir.display()))?;

    let step = Duration::from_millis(config.frame_interval_ms.max(1));
    let mut clock = Duration::ZERO;
    let mut audio = LogAudioPort::default();
    let mut choices = options.choices.iter().copied();

    let mut player = Player::new(project);
    player.set_show_scene_index(config.show_scene_index);
    player.start(&assets, clock)?;

    let mut frame_count = 0;
    loop {
        if let Some(image) = player.frame(&assets, clock)? {
            let path = frame_path(&config.frames_dir, frame_count);
            image
                .save(&path)
                .with_context(|| format!("写入帧失败: {}", path.display()))?;
        }
        frame_count += 1;
        dispatch_audio(&player.take_effects(), &mut audio);

        if frame_count >= options.max_frames {
            warn!(frames = frame_count, "达到帧数上限，停止播放");
            break;
        }
        if player.in_transition() {
            clock += step;
            continue;
        }
        if player.interpreter().is_finished() {
            break;
        }

        match player.interpreter().waiting().clone() {
            WaitingReason::WaitForChoice { choice_count } => {
                let index = choices.next().unwrap_or(0);
                if index >= choice_count {
                    bail!("选项索引 {index} 越界，当前只有 {choice_count} 个选项");
                }
                let Some(target) = player
                    .last_frame()
                    .and_then(|frame| frame.hit_table.boxes.iter().find(|b| b.choice_index == index))
                    .map(|b| b.rect)
                else {
                    bail!("选项 {index} 没有可点击区域");
                };
                let x = target.x + target.width as i32 / 2;
                let y = target.y + target.height as i32 / 2;
                info!(index, x, y, "选择");
                player.on_click(x, y, &assets, clock)?;
            }
            WaitingReason::WaitForClick => {
                player.on_click(0, 0, &assets, clock)?;
            }
            WaitingReason::None | WaitingReason::WaitForTransition { .. } => break,
        }
        clock += step;
    }

    info!(
        frames = frame_count,
        audio = audio.dispatched,
        scene = player.interpreter().scene_index(),
        finished = player.interpreter().is_finished(),
        "播放结束"
    );

    if let Some(path) = &options.save {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let json = SaveData::capture(1, timestamp, player.interpreter()).to_json()?;
        fs::write(path, json).with_context(|| format!("写入存档失败: {}", path.display()))?;
        info!(path = %path.display(), "存档已写入");
    }
    Ok(())
}

fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_path_is_zero_padded() {
        assert_eq!(
            frame_path(Path::new("out"), 7),
            Path::new("out").join("frame_00007.png")
        );
    }

    #[test]
    fn test_log_port_counts_dispatches() {
        let effects = vec![
            vn_core::Effect::Audio(vn_core::AudioCommand::Stop {
                channel: vn_core::AudioChannel::Bgm,
            }),
            vn_core::Effect::dialogue("", "hi"),
        ];
        let mut port = LogAudioPort::default();
        assert_eq!(dispatch_audio(&effects, &mut port), 1);
        assert_eq!(port.dispatched, 1);
    }
}
