//! 循环标记
//!
//! [`LooperEffect`] 是回跳点，[`LooperStartEffect`] 是回跳目标。
//! 播放器遍历到还有剩余次数的回跳点时，等所有反馈播完后向回查找：
//! 最近的时长大于 0 的暂停（`loop_at_last_pause`）或最近的循环起点
//! （`loop_at_last_loop_start`），找不到则回到列表开头。

use serde::{Deserialize, Serialize};

use crate::feedback::{EffectCx, FeedbackBehavior, LooperInfo, PauseWait};
use crate::vector::Vec3;

/// 循环回跳点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LooperEffect {
    /// 区域总共播放的次数
    #[serde(default = "default_number_of_loops")]
    pub number_of_loops: u32,

    /// 无限循环
    #[serde(default)]
    pub infinite_loop: bool,

    #[serde(default = "default_true")]
    pub loop_at_last_pause: bool,

    #[serde(default = "default_true")]
    pub loop_at_last_loop_start: bool,

    /// 自身时长（计入保持暂停）
    #[serde(default)]
    pub pause_duration: f32,

    #[serde(skip)]
    loops_left: u32,
}

fn default_number_of_loops() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for LooperEffect {
    fn default() -> Self {
        Self::new(default_number_of_loops())
    }
}

impl LooperEffect {
    pub fn new(number_of_loops: u32) -> Self {
        Self {
            number_of_loops,
            infinite_loop: false,
            loop_at_last_pause: true,
            loop_at_last_loop_start: true,
            pause_duration: 0.0,
            loops_left: number_of_loops,
        }
    }

    /// 无限循环
    pub fn infinite() -> Self {
        Self {
            infinite_loop: true,
            ..Self::new(0)
        }
    }

    /// 剩余循环次数
    pub fn loops_left(&self) -> u32 {
        self.loops_left
    }
}

impl FeedbackBehavior for LooperEffect {
    fn kind(&self) -> &'static str {
        "looper"
    }

    fn initialize(&mut self, _cx: &mut EffectCx) {
        self.loops_left = self.number_of_loops;
    }

    fn play(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        self.loops_left = self.loops_left.saturating_sub(1);
    }

    fn reset(&mut self) {
        self.loops_left = self.number_of_loops;
    }

    fn duration(&self) -> f32 {
        self.pause_duration
    }

    fn looper_pause(&self) -> bool {
        true
    }

    fn looper(&self) -> Option<LooperInfo> {
        Some(LooperInfo {
            loops_left: self.loops_left,
            infinite: self.infinite_loop,
            loop_at_last_pause: self.loop_at_last_pause,
            loop_at_last_loop_start: self.loop_at_last_loop_start,
        })
    }
}

/// 循环起点：时长默认为 0 的暂停
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LooperStartEffect {
    #[serde(default)]
    pub pause_duration: f32,
}

impl LooperStartEffect {
    pub fn new(pause_duration: f32) -> Self {
        Self { pause_duration }
    }
}

impl FeedbackBehavior for LooperStartEffect {
    fn kind(&self) -> &'static str {
        "looper_start"
    }

    fn play(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {}

    fn duration(&self) -> f32 {
        self.pause_duration
    }

    fn pause(&self) -> Option<PauseWait> {
        Some(PauseWait::Seconds(self.pause_duration))
    }

    fn looper_start(&self) -> bool {
        true
    }
}
