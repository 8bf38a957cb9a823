//! # Event 模块
//!
//! 播放器向 Host 发出的事件。
//!
//! 事件在播放器内部排队，Host 通过 `FeedbackPlayer::tick` 的返回值或
//! `FeedbackPlayer::take_events` 取走。播放器自身的生命周期事件
//! （play/pause/resume/revert/skip/complete）都携带 [`PlayerId`]；
//! 反馈在播放、停止时发出的副作用信号以 [`FeedbackSignal`] 的形式混在同一队列中，
//! 保持发生顺序。

use serde::{Deserialize, Serialize};

/// 信号标识符
///
/// 用于 `PauseWait::Signal`，外部调用 `FeedbackPlayer::signal` 解除等待。
pub type SignalId = String;

/// 播放器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// 创建新的播放器 ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// 获取内部 ID 值
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PlayerId({})", self.0)
    }
}

/// 反馈发出的副作用信号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSignal {
    /// 发出信号的反馈标签
    pub source: String,
    /// 反馈所在频道
    pub channel: i32,
    /// 信号名称（由具体反馈定义，如 `"shake"`、`"shake_stop"`）
    pub name: String,
    /// 信号数值（振幅、缩放等）
    pub value: f32,
}

/// 播放器事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// 开始播放
    Play { player: PlayerId },
    /// 暂停（保持暂停或脚本暂停）
    Pause { player: PlayerId },
    /// 恢复
    Resume { player: PlayerId },
    /// 方向翻转
    Revert { player: PlayerId },
    /// 跳到结尾
    Skip { player: PlayerId },
    /// 播放完成
    Complete { player: PlayerId },
    /// 反馈信号
    Signal(FeedbackSignal),
}

impl PlayerEvent {
    /// 事件所属的播放器（反馈信号没有）
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::Play { player }
            | Self::Pause { player }
            | Self::Resume { player }
            | Self::Revert { player }
            | Self::Skip { player }
            | Self::Complete { player } => Some(*player),
            Self::Signal(_) => None,
        }
    }

    /// 事件名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::Revert { .. } => "revert",
            Self::Skip { .. } => "skip",
            Self::Complete { .. } => "complete",
            Self::Signal(_) => "signal",
        }
    }
}

impl std::fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal(signal) => write!(
                f,
                "signal {} [{}] ch{} = {:.3}",
                signal.name, signal.source, signal.channel, signal.value
            ),
            other => write!(f, "{}", other.name()),
        }
    }
}
