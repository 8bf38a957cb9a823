//! 震屏

use feedback_runtime::{EffectCx, FeedbackBehavior, Vec3};
use serde::{Deserialize, Serialize};

/// 以信号请求宿主震动摄像机
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraShake {
    /// 振幅（乘以播放强度）
    pub amplitude: f32,
    /// 频率（Hz）
    pub frequency: f32,
    /// 持续时间（秒）
    pub duration: f32,
}

impl Default for CameraShake {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            frequency: 20.0,
            duration: 0.3,
        }
    }
}

impl FeedbackBehavior for CameraShake {
    fn kind(&self) -> &'static str {
        "camera_shake"
    }

    fn play(&mut self, cx: &mut EffectCx, _position: Vec3, intensity: f32) {
        cx.emit("shake", self.amplitude * intensity);
    }

    fn stop(&mut self, cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        cx.emit("shake_stop", 0.0);
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
    fn test_shake_scales_with_intensity() {
        let mut shake = CameraShake {
            amplitude: 2.0,
            ..CameraShake::default()
        };
        let mut fixture = Fixture::new();

        shake.play(&mut fixture.cx(0.0, 0.016), Vec3::zero(), 0.5);
        shake.stop(&mut fixture.cx(0.1, 0.016), Vec3::zero(), 0.5);

        assert_eq!(
            fixture.signals(),
            vec![("shake".to_string(), 1.0), ("shake_stop".to_string(), 0.0)]
        );
    }
}
