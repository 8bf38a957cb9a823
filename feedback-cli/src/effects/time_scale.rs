//! 顿帧 / 慢动作

use feedback_runtime::{EffectCx, FeedbackBehavior, Vec3};
use serde::{Deserialize, Serialize};

/// 请求宿主把缩放时钟改为 `scale`，持续 `duration` 后恢复为 1
///
/// 持续时间按反馈自己的时钟计算，通常应配合 `"timescale_mode": "unscaled"`，
/// 否则慢动作会拖慢自身的结束。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeScale {
    pub scale: f32,
    pub duration: f32,

    #[serde(skip)]
    ends_at: Option<f32>,
}

impl Default for TimeScale {
    fn default() -> Self {
        Self {
            scale: 0.2,
            duration: 0.1,
            ends_at: None,
        }
    }
}

impl TimeScale {
    fn restore(&mut self, cx: &mut EffectCx) {
        if self.ends_at.take().is_some() {
            cx.emit("time_scale", 1.0);
        }
    }
}

impl FeedbackBehavior for TimeScale {
    fn kind(&self) -> &'static str {
        "time_scale"
    }

    fn play(&mut self, cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        cx.emit("time_scale", self.scale.max(0.0));
        self.ends_at = Some(cx.now + cx.apply_time_multiplier(self.duration));
    }

    fn update(&mut self, cx: &mut EffectCx) {
        if self.ends_at.is_some_and(|end| cx.now >= end) {
            self.restore(cx);
        }
    }

    fn stop(&mut self, cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        self.restore(cx);
    }

    fn skip_to_end(&mut self, cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        self.restore(cx);
    }

    fn reset(&mut self) {
        self.ends_at = None;
    }

    fn duration(&self) -> f32 {
        self.duration
    }
}
