//! 保持暂停

use serde::{Deserialize, Serialize};

use super::PauseEffect;
use crate::feedback::{EffectCx, FeedbackBehavior, PauseWait};
use crate::vector::Vec3;

/// 保持暂停
///
/// 先等待之前启动的反馈按各自的总时长播完，再像普通暂停一样停留 `pause_duration`。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HoldingPauseEffect {
    #[serde(flatten)]
    pub pause: PauseEffect,
}

impl HoldingPauseEffect {
    pub fn new(pause_duration: f32) -> Self {
        Self {
            pause: PauseEffect::new(pause_duration),
        }
    }
}

impl FeedbackBehavior for HoldingPauseEffect {
    fn kind(&self) -> &'static str {
        "holding_pause"
    }

    fn initialize(&mut self, cx: &mut EffectCx) {
        self.pause.initialize(cx);
    }

    fn play(&mut self, cx: &mut EffectCx, position: Vec3, intensity: f32) {
        self.pause.play(cx, position, intensity);
    }

    fn duration(&self) -> f32 {
        self.pause.duration()
    }

    fn pause(&self) -> Option<PauseWait> {
        self.pause.pause()
    }

    fn holding_pause(&self) -> bool {
        true
    }

    fn script_driven_pause(&self) -> Option<f32> {
        self.pause.script_driven_pause()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holding_pause_flags() {
        let holding = HoldingPauseEffect::new(0.0);
        assert!(holding.holding_pause());
        assert!(!holding.looper_pause());
        assert_eq!(holding.pause(), Some(PauseWait::Seconds(0.0)));
    }

    #[test]
    fn test_deserialize_flattened() {
        let holding: HoldingPauseEffect =
            serde_json::from_str(r#"{"pause_duration":0.25}"#).unwrap();
        assert_eq!(holding.duration(), 0.25);
    }
}
