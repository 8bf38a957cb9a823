//! # Context 模块
//!
//! 播放器传给反馈的上下文。
//!
//! 反馈不持有播放器，播放器在每次调用时构造一个 [`OwnerView`] 快照
//! （方向、时长倍率、强制时间模式等）连同帧时间、随机数源和事件队列一起传入。

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::clock::{FrameTime, TimescaleMode};
use crate::event::{FeedbackSignal, PlayerEvent, PlayerId};

/// 播放器遍历方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 从上到下（正向）
    #[default]
    TopToBottom,
    /// 从下到上（反向）
    BottomToTop,
}

impl Direction {
    /// 翻转方向
    pub fn flipped(self) -> Self {
        match self {
            Self::TopToBottom => Self::BottomToTop,
            Self::BottomToTop => Self::TopToBottom,
        }
    }

    /// 遍历步长
    pub fn step(self) -> isize {
        match self {
            Self::TopToBottom => 1,
            Self::BottomToTop => -1,
        }
    }
}

/// 播放器状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwnerView {
    /// 播放器 ID
    pub player: PlayerId,
    /// 当前遍历方向
    pub direction: Direction,
    /// 时长倍率
    pub duration_multiplier: f32,
    /// 强制时间模式（覆盖各反馈自己的设置）
    pub forced_timescale: Option<TimescaleMode>,
    /// 是否正在跳到结尾
    pub skipping_to_end: bool,
}

impl Default for OwnerView {
    fn default() -> Self {
        Self {
            player: PlayerId::default(),
            direction: Direction::default(),
            duration_multiplier: 1.0,
            forced_timescale: None,
            skipping_to_end: false,
        }
    }
}

impl OwnerView {
    /// 按时长倍率缩放
    pub fn apply_time_multiplier(&self, duration: f32) -> f32 {
        duration * self.duration_multiplier
    }
}

/// 反馈生命周期调用的上下文
pub struct FeedbackCx<'a> {
    /// 播放器快照
    pub owner: OwnerView,
    /// 当前帧时间
    pub time: FrameTime,
    /// 随机数源（概率判定）
    pub rng: &'a mut dyn RngCore,
    /// 事件队列
    pub events: &'a mut Vec<PlayerEvent>,
}

impl<'a> FeedbackCx<'a> {
    pub fn new(
        owner: OwnerView,
        time: FrameTime,
        rng: &'a mut dyn RngCore,
        events: &'a mut Vec<PlayerEvent>,
    ) -> Self {
        Self {
            owner,
            time,
            rng,
            events,
        }
    }
}

/// 具体反馈钩子拿到的上下文
///
/// 时间已按反馈的时间模式换算好。
pub struct EffectCx<'a> {
    /// 反馈标签
    pub label: &'a str,
    /// 反馈频道
    pub channel: i32,
    /// 播放器快照
    pub owner: OwnerView,
    /// 反馈时钟的当前时间
    pub now: f32,
    /// 反馈时钟的本帧增量（跳到结尾时为 `f32::MAX`）
    pub delta_time: f32,
    /// 本次播放是否为正向
    pub normal_direction: bool,
    /// 随机数源
    pub rng: &'a mut dyn RngCore,
    events: &'a mut Vec<PlayerEvent>,
}

impl<'a> EffectCx<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: &'a str,
        channel: i32,
        owner: OwnerView,
        now: f32,
        delta_time: f32,
        normal_direction: bool,
        rng: &'a mut dyn RngCore,
        events: &'a mut Vec<PlayerEvent>,
    ) -> Self {
        Self {
            label,
            channel,
            owner,
            now,
            delta_time,
            normal_direction,
            rng,
            events,
        }
    }

    /// 发出信号
    pub fn emit(&mut self, name: impl Into<String>, value: f32) {
        self.events.push(PlayerEvent::Signal(FeedbackSignal {
            source: self.label.to_string(),
            channel: self.channel,
            name: name.into(),
            value,
        }));
    }

    /// 按播放方向换算归一化时间
    pub fn apply_direction(&self, normalized_time: f32) -> f32 {
        if self.normal_direction {
            normalized_time
        } else {
            1.0 - normalized_time
        }
    }

    /// 终止状态对应的归一化时间
    pub fn final_normalized_time(&self) -> f32 {
        if self.normal_direction { 1.0 } else { 0.0 }
    }

    /// 按时长倍率缩放
    pub fn apply_time_multiplier(&self, duration: f32) -> f32 {
        self.owner.apply_time_multiplier(duration)
    }
}
