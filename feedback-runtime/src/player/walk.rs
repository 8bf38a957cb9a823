//! # Walk 模块
//!
//! 含暂停的逐项遍历。
//!
//! 列表里有暂停或保持暂停时，播放器不再一次性播放所有反馈，而是逐个访问。
//! 每个反馈的访问分为若干阶段，任何阶段都可能挂起，下一次 tick 从同一阶段继续：
//!
//! ```text
//! Enter ─► [ScriptPause] ─► CheckHolding ─► [Holding] ─► Play ─► [Pause]
//!   ▲                                                              │
//!   │                                                              ▼
//! Advance ◄──────────────── [Looper] ◄──────────────────────── AfterPause
//!
//! 越界 ─► Finishing（等 holding_max）─► Draining（等仍在播放的反馈）─► 完成
//! ```

use rand::Rng;
use tracing::{debug, warn};

use super::FeedbackPlayer;
use crate::clock::TimescaleMode;
use crate::event::{PlayerEvent, SignalId};
use crate::feedback::{Direction, Feedback, LooperInfo, OwnerView, PauseWait, PlayArgs};

/// 播放器的播放阶段
#[derive(Debug, Clone, Default)]
pub(crate) enum PlayPhase {
    /// 未播放
    #[default]
    Idle,
    /// 等待播放器的初始延迟（非缩放时间）
    InitialDelay { started_at: f32, args: PlayArgs },
    /// 没有暂停：所有反馈已同时播放，按总时长判定完成
    Simultaneous { should_stop: bool },
    /// 逐项遍历
    Walk(Walk),
}

/// 遍历状态
#[derive(Debug, Clone)]
pub(crate) struct Walk {
    /// 当前访问的下标（可以暂时为 -1 或 count）
    index: isize,
    /// 开始遍历时的列表长度
    count: usize,
    stage: VisitStage,
    args: PlayArgs,
}

/// 单个反馈的访问阶段
#[derive(Debug, Clone, PartialEq)]
enum VisitStage {
    Enter,
    ScriptPause { started_at: f32, auto_resume: f32 },
    CheckHolding,
    Holding,
    Play,
    Pause {
        until: PauseUntil,
        started_at: f32,
        mode: TimescaleMode,
    },
    AfterPause,
    Looper,
    Advance,
    Finishing { ended_at: f32 },
    Draining,
}

/// 暂停的解除条件
#[derive(Debug, Clone, PartialEq)]
enum PauseUntil {
    /// 经过指定秒数（已乘时长倍率）
    Elapsed(f32),
    /// 收到信号
    Signal { id: SignalId, received: bool },
}

impl FeedbackPlayer {
    /// 开始遍历，并同步推进到第一个挂起点
    pub(super) fn start_walk(&mut self, args: PlayArgs) {
        let count = self.feedbacks.len();
        let index = match self.settings.direction {
            Direction::TopToBottom => 0,
            Direction::BottomToTop => count as isize - 1,
        };
        self.phase = PlayPhase::Walk(Walk {
            index,
            count,
            stage: VisitStage::Enter,
            args,
        });
        self.run_walk();
    }

    /// 推进遍历直到挂起或结束
    pub(super) fn run_walk(&mut self) {
        match std::mem::take(&mut self.phase) {
            PlayPhase::Walk(walk) => {
                if let Some(walk) = self.advance_walk(walk) {
                    self.phase = PlayPhase::Walk(walk);
                }
            }
            other => self.phase = other,
        }
    }

    /// 把信号交给正在等待它的暂停
    pub(super) fn deliver_signal(&mut self, signal: &str) -> bool {
        if let PlayPhase::Walk(walk) = &mut self.phase
            && let VisitStage::Pause {
                until: PauseUntil::Signal { id, received },
                ..
            } = &mut walk.stage
            && *id == signal
        {
            *received = true;
            return true;
        }
        false
    }

    fn abort_walk(&mut self, index: isize) -> Option<Walk> {
        warn!(
            player = %self.id,
            index,
            "遍历时遇到空槽位或列表已缩短，中止本次播放"
        );
        self.is_playing = false;
        None
    }

    /// 返回 `Some` 表示挂起，`None` 表示遍历结束（完成或中止）
    fn advance_walk(&mut self, mut walk: Walk) -> Option<Walk> {
        let direction = self.settings.direction;

        loop {
            let now = self.now();
            let owner = self.owner_view();

            if let VisitStage::Finishing { ended_at } = walk.stage {
                if now - ended_at < self.holding_max {
                    return Some(walk);
                }
                walk.stage = VisitStage::Draining;
            }
            if walk.stage == VisitStage::Draining {
                if self.has_feedback_still_playing() {
                    return Some(walk);
                }
                self.complete();
                return None;
            }

            // 回跳后的下标可能是哨兵值，先前进再取反馈
            if walk.stage == VisitStage::Advance {
                walk.index += direction.step();
                walk.stage = VisitStage::Enter;
            }
            if walk.stage == VisitStage::Enter {
                if !self.is_playing {
                    return None;
                }
                if walk.index < 0 || walk.index as usize >= walk.count {
                    walk.stage = VisitStage::Finishing { ended_at: now };
                    continue;
                }
            }

            let index = walk.index;
            let Some(Some(feedback)) = self.feedbacks.get(index as usize) else {
                return self.abort_walk(index);
            };
            let eligible = feedback.should_play_in_direction(direction);

            match walk.stage.clone() {
                VisitStage::Enter => {
                    let script_pause = if feedback.active {
                        feedback.script_driven_pause()
                    } else {
                        None
                    };
                    if script_pause.is_some() || self.in_script_driven_pause {
                        self.in_script_driven_pause = true;
                        walk.stage = VisitStage::ScriptPause {
                            started_at: now,
                            auto_resume: script_pause.unwrap_or(0.0),
                        };
                        return Some(walk);
                    }
                    walk.stage = VisitStage::CheckHolding;
                }
                VisitStage::ScriptPause {
                    started_at,
                    auto_resume,
                } => {
                    if self.in_script_driven_pause {
                        if auto_resume > 0.0 && now - started_at > auto_resume {
                            self.resume_feedbacks();
                        } else {
                            return Some(walk);
                        }
                    }
                    walk.stage = VisitStage::CheckHolding;
                }
                VisitStage::CheckHolding => {
                    if feedback.active
                        && (feedback.holding_pause() || feedback.looper_pause())
                        && eligible
                    {
                        self.events.push(PlayerEvent::Pause { player: self.id });
                        walk.stage = VisitStage::Holding;
                    } else {
                        walk.stage = VisitStage::Play;
                    }
                }
                VisitStage::Holding => {
                    if now - self.holding_since < self.holding_max {
                        return Some(walk);
                    }
                    self.holding_max = 0.0;
                    self.holding_since = now;
                    walk.stage = VisitStage::Play;
                }
                VisitStage::Play => {
                    let pause_active = feedback.active && eligible;
                    let chance = feedback.chance;
                    let mode = feedback.timescale(&owner);

                    if eligible {
                        let args = walk.args;
                        self.with_feedback(index as usize, |feedback, cx| {
                            feedback.play(cx, args.position, args.intensity)
                        });
                    }
                    // 播放可能重新随机了暂停时长
                    let pause = self.slot(index).and_then(Feedback::pause);

                    if let Some(wait) = pause
                        && pause_active
                    {
                        let should_pause = chance >= 100.0 || {
                            let roll: f32 = self.rng.gen_range(0.0..100.0);
                            roll <= chance
                        };
                        if should_pause {
                            let until = match wait {
                                PauseWait::Seconds(seconds) => {
                                    PauseUntil::Elapsed(owner.apply_time_multiplier(seconds))
                                }
                                PauseWait::Signal(id) => PauseUntil::Signal {
                                    id,
                                    received: false,
                                },
                            };
                            walk.stage = VisitStage::Pause {
                                until,
                                started_at: self.frame.now(mode),
                                mode,
                            };
                            return Some(walk);
                        }
                    }
                    walk.stage = VisitStage::AfterPause;
                }
                VisitStage::Pause {
                    until,
                    started_at,
                    mode,
                } => {
                    let done = match until {
                        PauseUntil::Elapsed(duration) => {
                            self.frame.now(mode) - started_at >= duration
                        }
                        PauseUntil::Signal { received, .. } => received,
                    };
                    if !done {
                        return Some(walk);
                    }
                    self.events.push(PlayerEvent::Resume { player: self.id });
                    self.holding_since = now;
                    self.holding_max = 0.0;
                    walk.stage = VisitStage::AfterPause;
                }
                VisitStage::AfterPause => {
                    if feedback.active
                        && feedback.pause().is_none()
                        && eligible
                        && !feedback.timing.exclude_from_holding_pauses
                    {
                        self.holding_max = self.holding_max.max(feedback.total_duration(&owner));
                    }

                    let should_loop = feedback.looper_pause()
                        && feedback.active
                        && eligible
                        && feedback.looper().is_some_and(|looper| looper.should_loop());
                    // 回跳前至少挂起一帧
                    if should_loop {
                        walk.stage = VisitStage::Looper;
                        return Some(walk);
                    }
                    walk.stage = VisitStage::Advance;
                }
                VisitStage::Looper => {
                    if self.has_feedback_still_playing() {
                        return Some(walk);
                    }
                    let looper = feedback.looper().unwrap_or(LooperInfo {
                        loops_left: 0,
                        infinite: false,
                        loop_at_last_pause: false,
                        loop_at_last_loop_start: false,
                    });
                    let target =
                        find_loop_target(&self.feedbacks, index, direction, &owner, looper);
                    debug!(player = %self.id, from = index, to = target, "循环回跳");
                    walk.index = target;
                    walk.stage = VisitStage::Advance;
                }
                VisitStage::Advance | VisitStage::Finishing { .. } | VisitStage::Draining => {}
            }
        }
    }
}

/// 查找循环回跳的目标下标
///
/// 从 `index` 逆着遍历方向查找；返回值会再前进一步才被访问，
/// 所以正向找不到时返回 -1，反向找不到时返回列表长度。
/// 正向时位于下标 0 的回跳点直接返回 0。
pub(crate) fn find_loop_target(
    feedbacks: &[Option<Feedback>],
    index: isize,
    direction: Direction,
    owner: &OwnerView,
    looper: LooperInfo,
) -> isize {
    let count = feedbacks.len() as isize;
    let step = -direction.step();
    let mut target = 0;

    let mut j = index + step;
    while j >= 0 && j <= count {
        if j == 0 {
            target = j - 1;
            break;
        }
        if j == count {
            target = j;
            break;
        }
        if let Some(Some(feedback)) = feedbacks.get(j as usize) {
            if feedback.pause().is_some()
                && feedback.feedback_duration(owner) > 0.0
                && looper.loop_at_last_pause
                && feedback.active
            {
                target = j;
                break;
            }
            if feedback.looper_start() && looper.loop_at_last_loop_start && feedback.active {
                target = j;
                break;
            }
        }
        j += step;
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{LooperEffect, LooperStartEffect, PauseEffect};
    use crate::testing::Probe;

    fn looper_info() -> LooperInfo {
        LooperInfo {
            loops_left: 1,
            infinite: false,
            loop_at_last_pause: true,
            loop_at_last_loop_start: true,
        }
    }

    fn list(items: Vec<Feedback>) -> Vec<Option<Feedback>> {
        items.into_iter().map(Some).collect()
    }

    #[test]
    fn test_loop_target_finds_looper_start() {
        let feedbacks = list(vec![
            Feedback::new("A", Probe::new(0.0)),
            Feedback::new("Start", LooperStartEffect::default()),
            Feedback::new("B", Probe::new(0.0)),
            Feedback::new("Looper", LooperEffect::new(2)),
        ]);
        let target = find_loop_target(
            &feedbacks,
            3,
            Direction::TopToBottom,
            &OwnerView::default(),
            looper_info(),
        );
        assert_eq!(target, 1);
    }

    #[test]
    fn test_loop_target_skips_zero_pause() {
        // 时长为 0 的普通暂停不是回跳目标，找不到时回到开头（-1）
        let feedbacks = list(vec![
            Feedback::new("A", Probe::new(0.0)),
            Feedback::new("A", Probe::new(0.0)),
            Feedback::new("Pause", PauseEffect::new(0.0)),
            Feedback::new("Looper", LooperEffect::new(2)),
        ]);
        let target = find_loop_target(
            &feedbacks,
            3,
            Direction::TopToBottom,
            &OwnerView::default(),
            looper_info(),
        );
        assert_eq!(target, -1);
    }

    #[test]
    fn test_loop_target_respects_flags() {
        let feedbacks = list(vec![
            Feedback::new("A", Probe::new(0.0)),
            Feedback::new("Pause", PauseEffect::new(0.5)),
            Feedback::new("Start", LooperStartEffect::default()),
            Feedback::new("Looper", LooperEffect::new(2)),
        ]);
        let owner = OwnerView::default();

        let mut info = looper_info();
        assert_eq!(
            find_loop_target(&feedbacks, 3, Direction::TopToBottom, &owner, info),
            2
        );

        info.loop_at_last_loop_start = false;
        assert_eq!(
            find_loop_target(&feedbacks, 3, Direction::TopToBottom, &owner, info),
            1
        );
    }

    #[test]
    fn test_loop_target_reverse_sentinel() {
        let feedbacks = list(vec![
            Feedback::new("Looper", LooperEffect::new(2)),
            Feedback::new("A", Probe::new(0.0)),
            Feedback::new("B", Probe::new(0.0)),
        ]);
        // 反向找不到目标时返回列表长度
        let target = find_loop_target(
            &feedbacks,
            0,
            Direction::BottomToTop,
            &OwnerView::default(),
            looper_info(),
        );
        assert_eq!(target, 3);
    }

    #[test]
    fn test_loop_target_at_index_zero() {
        let feedbacks = list(vec![
            Feedback::new("Looper", LooperEffect::new(2)),
            Feedback::new("A", Probe::new(0.0)),
        ]);
        let target = find_loop_target(
            &feedbacks,
            0,
            Direction::TopToBottom,
            &OwnerView::default(),
            looper_info(),
        );
        assert_eq!(target, 0);
    }

    #[test]
    fn test_loop_target_ignores_empty_slots() {
        let mut feedbacks = list(vec![
            Feedback::new("A", Probe::new(0.0)),
            Feedback::new("Start", LooperStartEffect::default()),
            Feedback::new("B", Probe::new(0.0)),
            Feedback::new("Looper", LooperEffect::new(2)),
        ]);
        feedbacks[2] = None;
        let target = find_loop_target(
            &feedbacks,
            3,
            Direction::TopToBottom,
            &OwnerView::default(),
            looper_info(),
        );
        assert_eq!(target, 1);
    }
}
