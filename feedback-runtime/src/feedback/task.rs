//! # Task 模块
//!
//! 反馈内部的可恢复任务。
//!
//! 每个等待点都是一个显式状态，由 `Feedback::tick` 推进；Stop 直接清空
//! 所有任务，不会留下继续修改状态的任务。
//!
//! 每次 Play 的初始延迟、每个周期的序列播放各自独立推进，互不覆盖。

use crate::vector::Vec3;

/// 播放调用的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlayArgs {
    pub position: Vec3,
    pub intensity: f32,
}

/// 播放任务
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) enum PlayTask {
    /// 没有进行中的任务
    #[default]
    Idle,
    /// 无限重复，等待下一次触发
    RepeatForever { next_at: f32, args: PlayArgs },
    /// 有限重复，等待下一次触发
    Repeating { next_at: f32, args: PlayArgs },
}

impl PlayTask {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// 等待初始延迟的一次 Play
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DelayedStart {
    pub started_at: f32,
    pub args: PlayArgs,
}

/// 一次序列驱动的播放
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SequenceRun {
    /// 已请求，下一帧开始
    Starting { args: PlayArgs },
    /// 按原始时间戳触发
    Timed {
        started_at: f32,
        /// 已处理到的序列内时间
        cursor: f32,
        args: PlayArgs,
    },
    /// 按量化节拍触发
    Beats {
        last_beat_at: Option<f32>,
        index: usize,
        args: PlayArgs,
    },
}
