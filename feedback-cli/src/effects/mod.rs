//! # Effects 模块
//!
//! CLI 自带的演示反馈。
//!
//! 它们不直接操作任何画面，只通过信号把意图交给宿主（见 `simulate`）：
//!
//! | 类型 | 信号 |
//! |------|------|
//! | `camera_shake` | `shake`（振幅），中断时 `shake_stop` |
//! | `flash` | `flash`（不透明度） |
//! | `position` | `position:<目标>.<轴>`（当前坐标） |
//! | `time_scale` | `time_scale`（目标缩放，结束时恢复为 1） |

mod camera_shake;
mod flash;
mod position;
mod time_scale;

pub use camera_shake::CameraShake;
pub use flash::Flash;
pub use position::PositionTween;
pub use time_scale::TimeScale;

use feedback_runtime::FeedbackRegistry;

/// 内置标记 + 演示反馈
pub fn registry() -> FeedbackRegistry {
    let mut registry = FeedbackRegistry::with_builtin();
    registry.register_serde::<CameraShake>("camera_shake");
    registry.register_serde::<Flash>("flash");
    registry.register_serde::<PositionTween>("position");
    registry.register_serde::<TimeScale>("time_scale");
    registry
}

#[cfg(test)]
pub(crate) mod test_cx {
    use feedback_runtime::{EffectCx, OwnerView, PlayerEvent};
    use rand::rngs::mock::StepRng;

    /// 构造一次钩子调用的上下文并收集信号
    pub struct Fixture {
        pub rng: StepRng,
        pub events: Vec<PlayerEvent>,
        pub owner: OwnerView,
        pub normal_direction: bool,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                rng: StepRng::new(0, 1),
                events: Vec::new(),
                owner: OwnerView::default(),
                normal_direction: true,
            }
        }

        pub fn cx(&mut self, now: f32, delta_time: f32) -> EffectCx<'_> {
            EffectCx::new(
                "Test",
                1,
                self.owner,
                now,
                delta_time,
                self.normal_direction,
                &mut self.rng,
                &mut self.events,
            )
        }

        /// 取走信号，格式为 `(名称, 数值)`
        pub fn signals(&mut self) -> Vec<(String, f32)> {
            std::mem::take(&mut self.events)
                .into_iter()
                .filter_map(|event| match event {
                    PlayerEvent::Signal(signal) => Some((signal.name, signal.value)),
                    _ => None,
                })
                .collect()
        }
    }
}
