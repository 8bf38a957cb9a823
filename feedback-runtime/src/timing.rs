//! # Timing 模块
//!
//! 单个反馈的时间策略：延迟、重复、冷却、方向条件、强度区间和序列绑定。

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::clock::TimescaleMode;
use crate::error::TimingError;
use crate::sequence::Sequence;

/// 反馈在播放器的哪个遍历方向上参与播放
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionCondition {
    /// 任意方向
    #[default]
    Always,
    /// 仅正向（TopToBottom）
    OnlyWhenForwards,
    /// 仅反向（BottomToTop）
    OnlyWhenBackwards,
}

/// 反馈自身的播放方向如何由播放器方向决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayDirection {
    /// 与播放器方向一致
    #[default]
    FollowParent,
    /// 与播放器方向相反
    OppositeParent,
    /// 总是正向
    AlwaysNormal,
    /// 总是反向
    AlwaysRewind,
}

/// 强度区间
///
/// 播放强度满足 `min <= intensity < max` 时反馈才参与播放。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityInterval {
    pub min: f32,
    pub max: f32,
}

impl IntensityInterval {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// 强度是否落在区间内
    pub fn contains(&self, intensity: f32) -> bool {
        intensity >= self.min && intensity < self.max
    }
}

/// 反馈时间策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackTiming {
    /// 时间缩放模式
    #[serde(default)]
    pub timescale_mode: TimescaleMode,

    /// 不参与保持暂停的时长统计，也不计入“仍在播放”
    #[serde(default)]
    pub exclude_from_holding_pauses: bool,

    /// 是否计入播放器总时长
    #[serde(default = "default_true")]
    pub contribute_to_total_duration: bool,

    /// 初始延迟（秒）
    #[serde(default)]
    pub initial_delay: f32,

    /// 冷却时长（秒）
    #[serde(default)]
    pub cooldown_duration: f32,

    /// Stop 时是否调用反馈的中断逻辑
    #[serde(default = "default_true")]
    pub interrupts_on_stop: bool,

    /// 重复次数（不含首次）
    #[serde(default)]
    pub number_of_repeats: u32,

    /// 无限重复（优先于 `number_of_repeats`）
    #[serde(default)]
    pub repeat_forever: bool,

    /// 两次重复之间的间隔（秒）
    #[serde(default = "default_delay_between_repeats")]
    pub delay_between_repeats: f32,

    /// 方向条件
    #[serde(default)]
    pub direction_condition: DirectionCondition,

    /// 播放方向
    #[serde(default)]
    pub play_direction: PlayDirection,

    /// 忽略传入的强度，总是以 1.0 播放
    #[serde(default)]
    pub constant_intensity: bool,

    /// 强度区间（None 表示不限制）
    #[serde(default)]
    pub intensity_interval: Option<IntensityInterval>,

    /// 绑定的序列（由 setup 按名称解析，不参与序列化）
    #[serde(skip)]
    pub sequence: Option<Rc<Sequence>>,

    /// 绑定的序列轨道 ID
    #[serde(default)]
    pub track_id: i32,

    /// 是否按量化结果播放序列
    #[serde(default)]
    pub quantized: bool,

    /// 量化播放的目标 BPM
    #[serde(default = "default_target_bpm")]
    pub target_bpm: u32,
}

fn default_true() -> bool {
    true
}

fn default_delay_between_repeats() -> f32 {
    1.0
}

fn default_target_bpm() -> u32 {
    120
}

impl Default for FeedbackTiming {
    fn default() -> Self {
        Self {
            timescale_mode: TimescaleMode::default(),
            exclude_from_holding_pauses: false,
            contribute_to_total_duration: true,
            initial_delay: 0.0,
            cooldown_duration: 0.0,
            interrupts_on_stop: true,
            number_of_repeats: 0,
            repeat_forever: false,
            delay_between_repeats: default_delay_between_repeats(),
            direction_condition: DirectionCondition::default(),
            play_direction: PlayDirection::default(),
            constant_intensity: false,
            intensity_interval: None,
            sequence: None,
            track_id: 0,
            quantized: false,
            target_bpm: default_target_bpm(),
        }
    }
}

impl FeedbackTiming {
    /// 设置初始延迟
    pub fn with_initial_delay(mut self, delay: f32) -> Self {
        self.initial_delay = delay;
        self
    }

    /// 设置冷却时长
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown_duration = cooldown;
        self
    }

    /// 设置重复次数与间隔
    pub fn with_repeats(mut self, repeats: u32, delay_between: f32) -> Self {
        self.number_of_repeats = repeats;
        self.delay_between_repeats = delay_between;
        self
    }

    /// 设置方向条件
    pub fn with_direction_condition(mut self, condition: DirectionCondition) -> Self {
        self.direction_condition = condition;
        self
    }

    /// 绑定序列
    pub fn with_sequence(mut self, sequence: Rc<Sequence>, track_id: i32) -> Self {
        self.sequence = Some(sequence);
        self.track_id = track_id;
        self
    }

    /// 每轮播放次数（重复次数 + 首次）
    pub fn plays_per_cycle(&self) -> u32 {
        self.number_of_repeats + 1
    }

    /// 校验时间策略
    pub fn validate(&self) -> Result<(), TimingError> {
        let durations = [
            ("initial_delay", self.initial_delay),
            ("cooldown_duration", self.cooldown_duration),
            ("delay_between_repeats", self.delay_between_repeats),
        ];
        for (field, value) in durations {
            if value < 0.0 {
                return Err(TimingError::NegativeDuration { field, value });
            }
        }

        if let Some(interval) = self.intensity_interval
            && interval.min > interval.max
        {
            return Err(TimingError::InvertedIntensityInterval {
                min: interval.min,
                max: interval.max,
            });
        }

        if self.quantized && self.target_bpm == 0 {
            return Err(TimingError::ZeroBpm);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let timing = FeedbackTiming::default();
        assert!(timing.contribute_to_total_duration);
        assert!(timing.interrupts_on_stop);
        assert_eq!(timing.delay_between_repeats, 1.0);
        assert_eq!(timing.target_bpm, 120);
        assert_eq!(timing.plays_per_cycle(), 1);
    }

    #[test]
    fn test_deserialize_uses_defaults() {
        let timing: FeedbackTiming =
            serde_json::from_str(r#"{"initial_delay":0.5,"direction_condition":"only_when_backwards"}"#)
                .unwrap();
        assert_eq!(timing.initial_delay, 0.5);
        assert_eq!(
            timing.direction_condition,
            DirectionCondition::OnlyWhenBackwards
        );
        assert!(timing.interrupts_on_stop);
        assert!(timing.sequence.is_none());
    }

    #[test]
    fn test_validate_negative() {
        let timing = FeedbackTiming::default().with_cooldown(-1.0);
        assert_eq!(
            timing.validate(),
            Err(TimingError::NegativeDuration {
                field: "cooldown_duration",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_validate_interval() {
        let mut timing = FeedbackTiming::default();
        timing.intensity_interval = Some(IntensityInterval::new(1.0, 0.5));
        assert!(matches!(
            timing.validate(),
            Err(TimingError::InvertedIntensityInterval { .. })
        ));
    }

    #[test]
    fn test_intensity_interval_half_open() {
        let interval = IntensityInterval::new(0.0, 1.0);
        assert!(interval.contains(0.0));
        assert!(interval.contains(0.99));
        assert!(!interval.contains(1.0));
        assert!(!interval.contains(-0.1));
    }
}
