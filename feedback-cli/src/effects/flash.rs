//! 闪白

use feedback_runtime::{EffectCx, FeedbackBehavior, Vec3};
use serde::{Deserialize, Serialize};

/// 以信号请求宿主全屏闪烁
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flash {
    /// 峰值不透明度（0 - 1，乘以播放强度）
    pub alpha: f32,
    /// 持续时间（秒）
    pub duration: f32,
}

impl Default for Flash {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            duration: 0.1,
        }
    }
}

impl FeedbackBehavior for Flash {
    fn kind(&self) -> &'static str {
        "flash"
    }

    fn play(&mut self, cx: &mut EffectCx, _position: Vec3, intensity: f32) {
        cx.emit("flash", (self.alpha * intensity).clamp(0.0, 1.0));
    }

    fn duration(&self) -> f32 {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::test_cx::Fixture;

    #[test]
    fn test_flash_alpha_clamped() {
        let mut flash = Flash::default();
        let mut fixture = Fixture::new();

        flash.play(&mut fixture.cx(0.0, 0.016), Vec3::zero(), 3.0);
        assert_eq!(fixture.signals(), vec![("flash".to_string(), 1.0)]);
    }
}
