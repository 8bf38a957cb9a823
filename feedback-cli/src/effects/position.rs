//! 位移补间

use feedback_runtime::{EffectCx, FeedbackBehavior, Vec3};
use serde::{Deserialize, Serialize};

use crate::easing::Easing;

/// 坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

/// 把场景中具名目标的一个坐标从 `from` 补间到 `to`
///
/// 每帧发出 `position:<target>.<axis>` 信号，数值为当前坐标。
/// 反向播放时从 `to` 补间回 `from`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionTween {
    /// 场景目标名称，缺失时反馈需要配置
    pub target: Option<String>,
    pub axis: Axis,
    pub from: f32,
    pub to: f32,
    /// 补间时长（秒）
    pub duration: f32,
    pub easing: Easing,
    /// 位移幅度是否乘以播放强度
    pub scale_with_intensity: bool,

    #[serde(skip)]
    running: Option<Tween>,
}

/// 进行中的补间
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tween {
    started_at: f32,
    duration: f32,
    intensity: f32,
}

impl Default for PositionTween {
    fn default() -> Self {
        Self {
            target: None,
            axis: Axis::X,
            from: 0.0,
            to: 1.0,
            duration: 0.5,
            easing: Easing::default(),
            scale_with_intensity: true,
            running: None,
        }
    }
}

impl PositionTween {
    pub fn new(target: impl Into<String>, from: f32, to: f32) -> Self {
        Self {
            target: Some(target.into()),
            from,
            to,
            ..Self::default()
        }
    }

    /// 是否正在补间
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn signal_name(&self) -> String {
        format!(
            "position:{}.{}",
            self.target.as_deref().unwrap_or_default(),
            self.axis.name()
        )
    }

    fn value_at(&self, normalized_time: f32, intensity: f32) -> f32 {
        let to = if self.scale_with_intensity {
            self.from + (self.to - self.from) * intensity
        } else {
            self.to
        };
        self.easing.remap(normalized_time, self.from, to)
    }

    fn emit_at(&self, cx: &mut EffectCx, normalized_time: f32, intensity: f32) {
        let value = self.value_at(cx.apply_direction(normalized_time), intensity);
        cx.emit(self.signal_name(), value);
    }
}

impl FeedbackBehavior for PositionTween {
    fn kind(&self) -> &'static str {
        "position"
    }

    fn play(&mut self, cx: &mut EffectCx, _position: Vec3, intensity: f32) {
        let tween = Tween {
            started_at: cx.now,
            duration: cx.apply_time_multiplier(self.duration),
            intensity,
        };
        self.emit_at(cx, 0.0, intensity);
        self.running = Some(tween);
    }

    fn update(&mut self, cx: &mut EffectCx) {
        let Some(tween) = self.running else {
            return;
        };
        let progress = if tween.duration <= 0.0 {
            1.0
        } else {
            ((cx.now - tween.started_at) / tween.duration).min(1.0)
        };
        self.emit_at(cx, progress, tween.intensity);
        if progress >= 1.0 {
            self.running = None;
        }
    }

    fn stop(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        self.running = None;
    }

    fn reset(&mut self) {
        self.running = None;
    }

    fn skip_to_end(&mut self, cx: &mut EffectCx, _position: Vec3, intensity: f32) {
        let intensity = self.running.map_or(intensity, |tween| tween.intensity);
        let value = self.value_at(cx.final_normalized_time(), intensity);
        cx.emit(self.signal_name(), value);
        self.running = None;
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn evaluate_requires_setup(&self) -> bool {
        self.target.as_deref().is_none_or(str::is_empty)
    }

    fn required_target(&self) -> &str {
        "target"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::test_cx::Fixture;

    fn linear(from: f32, to: f32) -> PositionTween {
        PositionTween {
            duration: 1.0,
            easing: Easing::Linear,
            ..PositionTween::new("hero", from, to)
        }
    }

    #[test]
    fn test_tween_progress() {
        let mut tween = linear(0.0, 4.0);
        let mut fixture = Fixture::new();

        tween.play(&mut fixture.cx(0.0, 0.0), Vec3::zero(), 1.0);
        tween.update(&mut fixture.cx(0.5, 0.5));
        assert!(tween.is_running());
        tween.update(&mut fixture.cx(1.25, 0.75));
        assert!(!tween.is_running());

        insta::assert_debug_snapshot!(fixture.signals(), @r#"
        [
            (
                "position:hero.x",
                0.0,
            ),
            (
                "position:hero.x",
                2.0,
            ),
            (
                "position:hero.x",
                4.0,
            ),
        ]
        "#);
    }

    #[test]
    fn test_reverse_direction_runs_backwards() {
        let mut tween = linear(0.0, 4.0);
        let mut fixture = Fixture::new();
        fixture.normal_direction = false;

        tween.play(&mut fixture.cx(0.0, 0.0), Vec3::zero(), 1.0);
        tween.skip_to_end(&mut fixture.cx(0.1, f32::MAX), Vec3::zero(), 1.0);

        let values: Vec<f32> = fixture.signals().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![4.0, 0.0]);
        assert!(!tween.is_running());
    }

    #[test]
    fn test_intensity_scales_distance() {
        let mut tween = linear(1.0, 3.0);
        let mut fixture = Fixture::new();

        tween.play(&mut fixture.cx(0.0, 0.0), Vec3::zero(), 0.5);
        tween.update(&mut fixture.cx(2.0, 2.0));
        assert_eq!(fixture.signals().last().map(|(_, v)| *v), Some(2.0));
    }

    #[test]
    fn test_missing_target_requires_setup() {
        assert!(PositionTween::default().evaluate_requires_setup());
        assert!(!linear(0.0, 1.0).evaluate_requires_setup());

        let tween: PositionTween = serde_json::from_str(r#"{ "target": "" }"#).unwrap();
        assert!(tween.evaluate_requires_setup());
    }
}
