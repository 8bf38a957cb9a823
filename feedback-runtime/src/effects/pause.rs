//! 阻塞式暂停

use rand::Rng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::event::SignalId;
use crate::feedback::{EffectCx, FeedbackBehavior, PauseWait};
use crate::vector::Vec3;

/// 暂停
///
/// 播放器遍历到它时挂起，直到时长结束（或收到信号）后继续。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseEffect {
    /// 暂停时长（秒）
    #[serde(default = "default_pause_duration")]
    pub pause_duration: f32,

    /// 是否在 min/max 之间随机时长
    #[serde(default)]
    pub randomize_pause_duration: bool,

    #[serde(default)]
    pub min_pause_duration: f32,

    #[serde(default = "default_max_pause_duration")]
    pub max_pause_duration: f32,

    /// 每次播放都重新随机
    #[serde(default = "default_true")]
    pub randomize_on_each_play: bool,

    /// 脚本暂停：需要外部恢复
    #[serde(default)]
    pub script_driven: bool,

    /// 脚本暂停是否自动恢复
    #[serde(default)]
    pub auto_resume: bool,

    /// 自动恢复时长（秒）
    #[serde(default)]
    pub auto_resume_after: f32,

    /// 改为等待外部信号
    #[serde(default)]
    pub wait_for_signal: Option<SignalId>,

    #[serde(skip)]
    rolled: Option<f32>,
}

fn default_pause_duration() -> f32 {
    1.0
}

fn default_max_pause_duration() -> f32 {
    3.0
}

fn default_true() -> bool {
    true
}

impl Default for PauseEffect {
    fn default() -> Self {
        Self::new(default_pause_duration())
    }
}

impl PauseEffect {
    /// 固定时长的暂停
    pub fn new(pause_duration: f32) -> Self {
        Self {
            pause_duration,
            randomize_pause_duration: false,
            min_pause_duration: 0.0,
            max_pause_duration: default_max_pause_duration(),
            randomize_on_each_play: true,
            script_driven: false,
            auto_resume: false,
            auto_resume_after: 0.0,
            wait_for_signal: None,
            rolled: None,
        }
    }

    /// 等待外部信号的暂停
    pub fn until_signal(signal: impl Into<SignalId>) -> Self {
        Self {
            wait_for_signal: Some(signal.into()),
            ..Self::new(0.0)
        }
    }

    /// 脚本暂停，`auto_resume_after` 为 0 时只能手动恢复
    pub fn script_driven(auto_resume_after: f32) -> Self {
        Self {
            script_driven: true,
            auto_resume: auto_resume_after > 0.0,
            auto_resume_after,
            ..Self::new(0.0)
        }
    }

    /// 在 min/max 之间随机时长
    pub fn randomized(min: f32, max: f32) -> Self {
        Self {
            randomize_pause_duration: true,
            min_pause_duration: min,
            max_pause_duration: max,
            ..Self::new(min)
        }
    }

    /// 当前生效的暂停时长
    pub fn current_duration(&self) -> f32 {
        self.rolled.unwrap_or(self.pause_duration)
    }

    fn roll(&mut self, rng: &mut dyn RngCore) {
        if !self.randomize_pause_duration {
            self.rolled = None;
            return;
        }
        let low = self.min_pause_duration.min(self.max_pause_duration);
        let high = self.min_pause_duration.max(self.max_pause_duration);
        self.rolled = Some(if high > low {
            rng.gen_range(low..=high)
        } else {
            low
        });
    }
}

impl FeedbackBehavior for PauseEffect {
    fn kind(&self) -> &'static str {
        "pause"
    }

    fn initialize(&mut self, cx: &mut EffectCx) {
        self.roll(cx.rng);
    }

    fn play(&mut self, cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        if self.randomize_on_each_play || self.rolled.is_none() {
            self.roll(cx.rng);
        }
    }

    fn duration(&self) -> f32 {
        self.current_duration()
    }

    fn pause(&self) -> Option<PauseWait> {
        Some(match &self.wait_for_signal {
            Some(signal) => PauseWait::Signal(signal.clone()),
            None => PauseWait::Seconds(self.current_duration()),
        })
    }

    fn script_driven_pause(&self) -> Option<f32> {
        if !self.script_driven {
            return None;
        }
        Some(if self.auto_resume {
            self.auto_resume_after
        } else {
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::OwnerView;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn with_cx(f: impl FnOnce(&mut EffectCx)) {
        let mut rng = StdRng::seed_from_u64(3);
        let mut events = Vec::new();
        let mut cx = EffectCx::new(
            "Pause",
            0,
            OwnerView::default(),
            0.0,
            0.0,
            true,
            &mut rng,
            &mut events,
        );
        f(&mut cx);
    }

    #[test]
    fn test_fixed_pause() {
        let pause = PauseEffect::new(0.5);
        assert_eq!(pause.duration(), 0.5);
        assert_eq!(pause.pause(), Some(PauseWait::Seconds(0.5)));
        assert_eq!(pause.script_driven_pause(), None);
    }

    #[test]
    fn test_randomized_within_bounds() {
        let mut pause = PauseEffect::randomized(0.5, 1.5);
        with_cx(|cx| {
            for _ in 0..20 {
                pause.play(cx, Vec3::zero(), 1.0);
                let d = pause.duration();
                assert!((0.5..=1.5).contains(&d));
            }
        });
    }

    #[test]
    fn test_randomized_swapped_bounds() {
        let mut pause = PauseEffect::randomized(2.0, 1.0);
        with_cx(|cx| pause.initialize(cx));
        assert!((1.0..=2.0).contains(&pause.duration()));
    }

    #[test]
    fn test_script_driven() {
        assert_eq!(PauseEffect::script_driven(0.0).script_driven_pause(), Some(0.0));
        assert_eq!(PauseEffect::script_driven(2.0).script_driven_pause(), Some(2.0));
    }

    #[test]
    fn test_signal_pause() {
        let pause = PauseEffect::until_signal("door_opened");
        assert_eq!(
            pause.pause(),
            Some(PauseWait::Signal("door_opened".to_string()))
        );
    }

    #[test]
    fn test_deserialize_defaults() {
        let pause: PauseEffect = serde_json::from_str("{}").unwrap();
        assert_eq!(pause, PauseEffect::default());
    }
}
