//! # Clock 模块
//!
//! 帧时间与时钟。
//!
//! Runtime 不读取真实时间，Host 每帧调用 [`Clock::advance`] 得到一个 [`FrameTime`]，
//! 再把它传给 `FeedbackPlayer::tick`。缩放时间（受 `time_scale` 影响）和
//! 非缩放时间同时推进，由各反馈按自己的 [`TimescaleMode`] 选择读取哪一个。

use serde::{Deserialize, Serialize};

/// 时间缩放模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimescaleMode {
    /// 受 time_scale 影响
    #[default]
    Scaled,
    /// 不受 time_scale 影响
    Unscaled,
}

/// 一帧的时间快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// 缩放时间（秒）
    pub time: f32,
    /// 非缩放时间（秒）
    pub unscaled_time: f32,
    /// 本帧缩放增量
    pub delta_time: f32,
    /// 本帧非缩放增量
    pub unscaled_delta_time: f32,
    /// 已推进的帧数
    pub frame_count: u64,
}

impl FrameTime {
    /// 按模式读取当前时间
    pub fn now(&self, mode: TimescaleMode) -> f32 {
        match mode {
            TimescaleMode::Scaled => self.time,
            TimescaleMode::Unscaled => self.unscaled_time,
        }
    }

    /// 按模式读取本帧增量
    pub fn delta(&self, mode: TimescaleMode) -> f32 {
        match mode {
            TimescaleMode::Scaled => self.delta_time,
            TimescaleMode::Unscaled => self.unscaled_delta_time,
        }
    }
}

/// 模拟时钟
#[derive(Debug, Clone)]
pub struct Clock {
    frame: FrameTime,
    time_scale: f32,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// 创建从 0 开始、time_scale 为 1 的时钟
    pub fn new() -> Self {
        Self {
            frame: FrameTime::default(),
            time_scale: 1.0,
        }
    }

    /// 当前帧时间
    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    /// 当前时间缩放
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// 设置时间缩放（负数按 0 处理）
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// 推进一帧
    ///
    /// `unscaled_dt` 为真实流逝的秒数，缩放增量为 `unscaled_dt * time_scale`。
    pub fn advance(&mut self, unscaled_dt: f32) -> FrameTime {
        let unscaled_dt = unscaled_dt.max(0.0);
        let scaled_dt = unscaled_dt * self.time_scale;
        self.frame = FrameTime {
            time: self.frame.time + scaled_dt,
            unscaled_time: self.frame.unscaled_time + unscaled_dt,
            delta_time: scaled_dt,
            unscaled_delta_time: unscaled_dt,
            frame_count: self.frame.frame_count + 1,
        };
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut clock = Clock::new();
        let frame = clock.advance(0.5);
        assert_eq!(frame.time, 0.5);
        assert_eq!(frame.unscaled_time, 0.5);
        assert_eq!(frame.frame_count, 1);
    }

    #[test]
    fn test_time_scale_only_affects_scaled_time() {
        let mut clock = Clock::new();
        clock.set_time_scale(0.5);
        clock.advance(1.0);
        let frame = clock.advance(1.0);

        assert_eq!(frame.now(TimescaleMode::Scaled), 1.0);
        assert_eq!(frame.now(TimescaleMode::Unscaled), 2.0);
        assert_eq!(frame.delta(TimescaleMode::Scaled), 0.5);
        assert_eq!(frame.delta(TimescaleMode::Unscaled), 1.0);
    }

    #[test]
    fn test_negative_inputs_clamped() {
        let mut clock = Clock::new();
        clock.set_time_scale(-2.0);
        assert_eq!(clock.time_scale(), 0.0);

        let frame = clock.advance(-1.0);
        assert_eq!(frame.unscaled_time, 0.0);
    }
}
