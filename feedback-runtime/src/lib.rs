//! # Feedback Runtime
//!
//! 游戏手感反馈（震屏、闪白、位移、顿帧……）的编排运行时。
//!
//! ## 架构概述
//!
//! `feedback-runtime` 是纯逻辑核心，不读取真实时间、不依赖任何渲染引擎。
//! Host 每帧推进时钟并调用 `tick`，播放器返回本帧产生的事件：
//!
//! ```text
//! Host                              Runtime
//!   │                                  │
//!   │──── play() / stop() / ... ─────►│
//!   │                                  │
//!   │──── tick(FrameTime) ───────────►│ 推进反馈任务与遍历
//!   │◄─── Vec<PlayerEvent> ───────────│
//!   │                                  │
//! ```
//!
//! 具体的表现由 Host 实现 [`FeedbackBehavior`] 提供，通过 [`EffectCx::emit`]
//! 发出 [`FeedbackSignal`]，与播放器事件一起交还给 Host。
//!
//! ## 核心类型
//!
//! - [`FeedbackPlayer`]：有序的反馈列表及其编排
//! - [`Feedback`]：单个反馈的共享时间逻辑（延迟、重复、冷却、序列）
//! - [`FeedbackBehavior`]：具体反馈实现的接口
//! - [`PlayerEvent`]：播放器与反馈发出的事件
//! - [`PlayerSetup`] / [`FeedbackRegistry`]：从 JSON 构建播放器
//!
//! ## 使用示例
//!
//! ```ignore
//! use feedback_runtime::{Clock, FeedbackPlayer, FeedbackRegistry, PlayerId, PlayerSetup};
//!
//! let setup = PlayerSetup::from_json(json)?;
//! let mut player = setup.build(PlayerId::new(1), &registry)?.player;
//! player.awake();
//! player.start();
//! player.play();
//!
//! let mut clock = Clock::new();
//! loop {
//!     for event in player.tick(clock.advance(1.0 / 60.0)) {
//!         host.handle(event);
//!     }
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`clock`]：帧时间与时钟
//! - [`feedback`]：单个反馈
//! - [`player`]：播放器与遍历
//! - [`effects`]：暂停、保持暂停、循环等编排标记
//! - [`sequence`]：触发序列与 BPM 量化
//! - [`setup`]：JSON 描述与类型注册表
//! - [`diagnostic`]：静态检查
//! - [`error`]：错误类型定义

pub mod clock;
pub mod diagnostic;
pub mod effects;
pub mod error;
pub mod event;
pub mod feedback;
pub mod globals;
pub mod player;
pub mod sequence;
pub mod setup;
pub mod timing;
pub mod vector;

#[cfg(test)]
mod testing;

// 重导出核心类型
pub use clock::{Clock, FrameTime, TimescaleMode};
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_player, analyze_setup};
pub use effects::{HoldingPauseEffect, LooperEffect, LooperStartEffect, PauseEffect};
pub use error::{FeedbackError, FeedbackResult, SequenceError, SetupError, TimingError};
pub use event::{FeedbackSignal, PlayerEvent, PlayerId, SignalId};
pub use feedback::{
    Direction, EffectCx, Feedback, FeedbackBehavior, FeedbackCx, LooperInfo, OwnerView, PauseWait,
};
pub use globals::FeedbackGlobals;
pub use player::{FeedbackPlayer, InitializationMode, PlayerSettings};
pub use sequence::{Sequence, SequenceNote, SequenceTrack};
pub use setup::{BehaviorFactory, BuiltPlayer, FeedbackRegistry, FeedbackSetup, PlayerSetup};
pub use timing::{DirectionCondition, FeedbackTiming, IntensityInterval, PlayDirection};
pub use vector::Vec3;
