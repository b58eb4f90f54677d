//! # Audio 模块
//!
//! 音频命令与外部音频端口。
//!
//! 核心不做混音：解释器只产出 [`AudioCommand`]，由 Host 实现的 [`AudioPort`]
//! 以"发出即忘"的方式播放。参数在产出时钳制到文档规定的范围。

use serde::{Deserialize, Serialize};

use crate::command::{AudioParams, FadeParams, SfxParams};
use crate::effect::Effect;

/// 音量上限
pub const MAX_VOLUME: u8 = 100;
/// 音高范围（百分比）
pub const PITCH_RANGE: (u16, u16) = (50, 200);
/// 声像范围
pub const PAN_RANGE: (i16, i16) = (-100, 100);

/// 持续播放的音频通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioChannel {
    /// 背景音乐
    Bgm,
    /// 环境音
    Bgs,
}

/// 交给 Host 的音频指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCommand {
    Play {
        channel: AudioChannel,
        source: String,
        volume: u8,
        pitch: u16,
    },
    Stop {
        channel: AudioChannel,
    },
    Fade {
        channel: AudioChannel,
        target_volume: u8,
        duration_ms: u32,
    },
    Sfx {
        source: String,
        volume: u8,
        pitch: u16,
        pan: i16,
    },
}

impl AudioCommand {
    /// 播放指令（参数已钳制）
    pub fn play(channel: AudioChannel, params: &AudioParams) -> Self {
        Self::Play {
            channel,
            source: params.source.clone(),
            volume: clamp_volume(params.volume),
            pitch: clamp_pitch(params.pitch),
        }
    }

    /// 渐变指令（参数已钳制）
    pub fn fade(channel: AudioChannel, params: &FadeParams) -> Self {
        Self::Fade {
            channel,
            target_volume: clamp_volume(params.target_volume),
            duration_ms: params.duration_ms,
        }
    }

    /// 音效指令（参数已钳制）
    pub fn sfx(params: &SfxParams) -> Self {
        Self::Sfx {
            source: params.source.clone(),
            volume: clamp_volume(params.volume),
            pitch: clamp_pitch(params.pitch),
            pan: params.pan.clamp(PAN_RANGE.0, PAN_RANGE.1),
        }
    }
}

fn clamp_volume(volume: u8) -> u8 {
    volume.min(MAX_VOLUME)
}

fn clamp_pitch(pitch: u16) -> u16 {
    pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1)
}

/// Host 实现的音频端口
pub trait AudioPort {
    fn play_bgm(&mut self, source: &str, volume: u8, pitch: u16);
    fn stop_bgm(&mut self);
    fn fade_bgm(&mut self, target_volume: u8, duration_ms: u32);
    fn play_bgs(&mut self, source: &str, volume: u8, pitch: u16);
    fn stop_bgs(&mut self);
    fn fade_bgs(&mut self, target_volume: u8, duration_ms: u32);
    fn play_sfx(&mut self, source: &str, volume: u8, pitch: u16, pan: i16);
}

/// 把单条音频指令转发给端口
pub fn apply_audio(command: &AudioCommand, port: &mut impl AudioPort) {
    match command {
        AudioCommand::Play {
            channel: AudioChannel::Bgm,
            source,
            volume,
            pitch,
        } => port.play_bgm(source, *volume, *pitch),
        AudioCommand::Play {
            channel: AudioChannel::Bgs,
            source,
            volume,
            pitch,
        } => port.play_bgs(source, *volume, *pitch),
        AudioCommand::Stop {
            channel: AudioChannel::Bgm,
        } => port.stop_bgm(),
        AudioCommand::Stop {
            channel: AudioChannel::Bgs,
        } => port.stop_bgs(),
        AudioCommand::Fade {
            channel: AudioChannel::Bgm,
            target_volume,
            duration_ms,
        } => port.fade_bgm(*target_volume, *duration_ms),
        AudioCommand::Fade {
            channel: AudioChannel::Bgs,
            target_volume,
            duration_ms,
        } => port.fade_bgs(*target_volume, *duration_ms),
        AudioCommand::Sfx {
            source,
            volume,
            pitch,
            pan,
        } => port.play_sfx(source, *volume, *pitch, *pan),
    }
}

/// 按顺序转发效果列表中的全部音频指令，返回转发条数
pub fn dispatch_audio(effects: &[Effect], port: &mut impl AudioPort) -> usize {
    let mut count = 0;
    for effect in effects {
        if let Effect::Audio(command) = effect {
            apply_audio(command, port);
            count += 1;
        }
    }
    count
}
