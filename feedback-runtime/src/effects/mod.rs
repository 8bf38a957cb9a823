//! # Effects 模块
//!
//! 编排用的标记反馈。
//!
//! 它们本身不产生任何表现，只通过 [`FeedbackBehavior`](crate::feedback::FeedbackBehavior)
//! 的编排标记影响播放器的遍历：
//!
//! | 类型 | `pause` | `holding_pause` | `looper_pause` | `looper_start` |
//! |------|---------|-----------------|----------------|----------------|
//! | [`PauseEffect`] | ✓ | | | |
//! | [`HoldingPauseEffect`] | ✓ | ✓ | | |
//! | [`LooperEffect`] | | | ✓ | |
//! | [`LooperStartEffect`] | ✓ | | | ✓ |

mod holding_pause;
mod looper;
mod pause;

pub use holding_pause::HoldingPauseEffect;
pub use looper::{LooperEffect, LooperStartEffect};
pub use pause::PauseEffect;
