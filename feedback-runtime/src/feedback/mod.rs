//! # Feedback 模块
//!
//! 单个反馈：共享的生命周期与时间逻辑 + 具体实现（[`FeedbackBehavior`]）。
//!
//! ## 播放流程
//!
//! ```text
//! play ──► (inactive / cooldown) ──► 忽略
//!   │
//!   ├─ initial_delay > 0 ──► 排入 DelayedStart ──tick──► regular_play
//!   └─────────────────────────────────────────────► regular_play
//!
//! regular_play ──► chance / 强度区间 ──► RepeatForever | Repeating | 单次 | 序列
//! ```
//!
//! 所有等待都是 [`task`] 中的显式状态，由 [`Feedback::tick`] 推进。
//! 每次延迟的 Play、每个周期发起的序列各占一项，互不覆盖。

pub mod behavior;
pub mod context;
mod task;

pub use behavior::{FeedbackBehavior, LooperInfo, PauseWait};
pub use context::{Direction, EffectCx, FeedbackCx, OwnerView};

use std::any::Any;
use std::rc::Rc;

use rand::Rng;
use tracing::{debug, warn};

use crate::clock::TimescaleMode;
use crate::sequence::Sequence;
use crate::timing::{DirectionCondition, FeedbackTiming, PlayDirection};
use crate::vector::Vec3;
use task::{DelayedStart, PlayTask, SequenceRun};

pub(crate) use task::PlayArgs;

/// 默认标签
pub const DEFAULT_LABEL: &str = "Feedback";

/// 反馈
pub struct Feedback {
    /// 标签
    pub label: String,
    /// 是否启用
    pub active: bool,
    /// 播放概率（0-100）
    pub chance: f32,
    /// 频道
    pub channel: i32,
    /// 时间策略
    pub timing: FeedbackTiming,

    behavior: Box<dyn FeedbackBehavior>,
    last_play_timestamp: f32,
    plays_left: u32,
    initialized: bool,
    requires_setup: bool,
    required_target: String,
    task: PlayTask,
    delayed_starts: Vec<DelayedStart>,
    sequence_runs: Vec<SequenceRun>,
    /// 最近一次调用时看到的播放器快照
    owner: OwnerView,
    /// 最近一次调用时反馈时钟的时间
    clock_now: f32,
}

impl std::fmt::Debug for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feedback")
            .field("label", &self.label)
            .field("kind", &self.behavior.kind())
            .field("active", &self.active)
            .field("chance", &self.chance)
            .field("last_play_timestamp", &self.last_play_timestamp)
            .field("plays_left", &self.plays_left)
            .finish()
    }
}

impl Feedback {
    /// 创建反馈
    pub fn new<B: FeedbackBehavior>(label: impl Into<String>, behavior: B) -> Self {
        Self::from_boxed(label, Box::new(behavior))
    }

    /// 从已装箱的实现创建反馈
    pub fn from_boxed(label: impl Into<String>, behavior: Box<dyn FeedbackBehavior>) -> Self {
        let timing = FeedbackTiming::default();
        let plays_left = timing.plays_per_cycle();
        let mut feedback = Self {
            label: label.into(),
            active: true,
            chance: 100.0,
            channel: 0,
            timing,
            behavior,
            last_play_timestamp: -1.0,
            plays_left,
            initialized: false,
            requires_setup: false,
            required_target: String::new(),
            task: PlayTask::Idle,
            delayed_starts: Vec::new(),
            sequence_runs: Vec::new(),
            owner: OwnerView::default(),
            clock_now: 0.0,
        };
        feedback.cache_requires_setup();
        feedback
    }

    /// 设置时间策略
    pub fn with_timing(mut self, timing: FeedbackTiming) -> Self {
        self.plays_left = timing.plays_per_cycle();
        self.timing = timing;
        self
    }

    /// 设置播放概率
    pub fn with_chance(mut self, chance: f32) -> Self {
        self.chance = chance;
        self
    }

    /// 设置频道
    pub fn with_channel(mut self, channel: i32) -> Self {
        self.channel = channel;
        self
    }

    /// 设置是否启用
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    // ========== 查询 ==========

    /// 具体实现的类型名
    pub fn kind(&self) -> &'static str {
        self.behavior.kind()
    }

    /// 具体实现
    pub fn behavior(&self) -> &dyn FeedbackBehavior {
        self.behavior.as_ref()
    }

    /// 具体实现（可变）
    pub fn behavior_mut(&mut self) -> &mut dyn FeedbackBehavior {
        self.behavior.as_mut()
    }

    /// 按类型获取具体实现
    pub fn downcast_ref<T: FeedbackBehavior>(&self) -> Option<&T> {
        let any: &dyn Any = self.behavior.as_ref();
        any.downcast_ref::<T>()
    }

    /// 按类型获取具体实现（可变）
    pub fn downcast_mut<T: FeedbackBehavior>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self.behavior.as_mut();
        any.downcast_mut::<T>()
    }

    /// 是否为指定类型
    pub fn is<T: FeedbackBehavior>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// 上次播放的时间戳（未播放为 -1）
    pub fn last_play_timestamp(&self) -> f32 {
        self.last_play_timestamp
    }

    /// 本轮剩余播放次数
    pub fn plays_left(&self) -> u32 {
        self.plays_left
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 是否缺少必需的外部目标（缓存值）
    pub fn requires_setup(&self) -> bool {
        self.requires_setup
    }

    /// 缺少的目标（形如 `[Target]`，不缺少时为空）
    pub fn required_target(&self) -> &str {
        &self.required_target
    }

    /// 重新计算并缓存 `requires_setup`
    pub fn cache_requires_setup(&mut self) {
        self.requires_setup = self.behavior.evaluate_requires_setup();
        let target = self.behavior.required_target();
        self.required_target = if target.is_empty() {
            String::new()
        } else {
            format!("[{target}]")
        };
    }

    /// 绑定的序列
    pub fn sequence(&self) -> Option<&Rc<Sequence>> {
        self.timing.sequence.as_ref()
    }

    /// 实际使用的时间模式
    pub fn timescale(&self, owner: &OwnerView) -> TimescaleMode {
        owner.forced_timescale.unwrap_or(self.timing.timescale_mode)
    }

    /// 单次播放时长（已乘时长倍率）
    pub fn feedback_duration(&self, owner: &OwnerView) -> f32 {
        owner.apply_time_multiplier(self.behavior.duration())
    }

    /// 总时长
    ///
    /// `initial_delay·m + d + n·d + n·g·m`，其中 `d` 已乘倍率 `m`；
    /// 不计入总时长的反馈返回 0。
    pub fn total_duration(&self, owner: &OwnerView) -> f32 {
        if !self.timing.contribute_to_total_duration {
            return 0.0;
        }

        let duration = self.feedback_duration(owner);
        let mut total = 0.0;
        if self.timing.initial_delay != 0.0 {
            total += owner.apply_time_multiplier(self.timing.initial_delay);
        }
        total += duration;
        if self.timing.number_of_repeats != 0 {
            let repeats = self.timing.number_of_repeats as f32;
            let gap = owner.apply_time_multiplier(self.timing.delay_between_repeats);
            total += repeats * duration + repeats * gap;
        }
        total
    }

    /// 是否在冷却中
    pub fn in_cooldown(&self, now: f32) -> bool {
        self.timing.cooldown_duration > 0.0
            && self.last_play_timestamp >= 0.0
            && now - self.last_play_timestamp < self.timing.cooldown_duration
    }

    /// 是否仍在播放（以最近一次 tick 的时间为准）
    ///
    /// 有进行中的延迟、重复或序列任务，或距上次播放不足一个单次时长。
    pub fn is_playing(&self) -> bool {
        if self.task.is_active()
            || !self.delayed_starts.is_empty()
            || !self.sequence_runs.is_empty()
        {
            return true;
        }
        self.last_play_timestamp >= 0.0
            && self.clock_now - self.last_play_timestamp < self.feedback_duration(&self.owner)
    }

    /// 在播放器的当前方向上是否参与播放
    pub fn should_play_in_direction(&self, direction: Direction) -> bool {
        match self.timing.direction_condition {
            DirectionCondition::Always => true,
            DirectionCondition::OnlyWhenForwards => direction == Direction::TopToBottom,
            DirectionCondition::OnlyWhenBackwards => direction == Direction::BottomToTop,
        }
    }

    /// 本反馈在播放器的当前方向下是否正向播放
    pub fn normal_play_direction(&self, direction: Direction) -> bool {
        match self.timing.play_direction {
            PlayDirection::FollowParent => direction == Direction::TopToBottom,
            PlayDirection::OppositeParent => direction != Direction::TopToBottom,
            PlayDirection::AlwaysNormal => true,
            PlayDirection::AlwaysRewind => false,
        }
    }

    /// 实际使用的强度
    pub fn effective_intensity(&self, intensity: f32) -> f32 {
        if self.timing.constant_intensity {
            1.0
        } else {
            intensity
        }
    }

    // ========== 编排标记 ==========

    /// 阻塞式暂停
    pub fn pause(&self) -> Option<PauseWait> {
        self.behavior.pause()
    }

    /// 是否为保持暂停
    pub fn holding_pause(&self) -> bool {
        self.behavior.holding_pause()
    }

    /// 是否为循环回跳点
    pub fn looper_pause(&self) -> bool {
        self.behavior.looper_pause()
    }

    /// 是否为循环起点
    pub fn looper_start(&self) -> bool {
        self.behavior.looper_start()
    }

    /// 循环状态
    pub fn looper(&self) -> Option<LooperInfo> {
        self.behavior.looper()
    }

    /// 脚本暂停的自动恢复时长
    pub fn script_driven_pause(&self) -> Option<f32> {
        self.behavior.script_driven_pause()
    }

    // ========== 生命周期 ==========

    /// 初始化（可重复调用）
    pub fn initialize(&mut self, cx: &mut FeedbackCx) {
        self.observe(cx);
        self.last_play_timestamp = -1.0;
        self.initialized = true;
        self.plays_left = self.timing.plays_per_cycle();
        self.with_effect_cx(cx, |behavior, ecx| behavior.initialize(ecx));
        self.cache_requires_setup();
    }

    /// 播放
    pub fn play(&mut self, cx: &mut FeedbackCx, position: Vec3, intensity: f32) {
        self.observe(cx);
        if !self.active {
            return;
        }
        if !self.initialized {
            warn!(label = %self.label, "反馈在初始化之前被播放，请先调用 initialize");
        }

        let now = self.clock_now;
        if self.in_cooldown(now) {
            debug!(label = %self.label, "反馈冷却中，忽略播放");
            return;
        }

        let args = PlayArgs {
            position,
            intensity,
        };
        if self.timing.initial_delay > 0.0 {
            self.delayed_starts.push(DelayedStart {
                started_at: now,
                args,
            });
        } else {
            self.regular_play(cx, args);
            self.last_play_timestamp = now;
        }
    }

    /// 停止：取消所有任务并重置计数
    pub fn stop(&mut self, cx: &mut FeedbackCx, position: Vec3, intensity: f32) {
        self.observe(cx);
        self.task = PlayTask::Idle;
        self.delayed_starts.clear();
        self.sequence_runs.clear();
        self.last_play_timestamp = -1.0;
        self.plays_left = self.timing.plays_per_cycle();

        if self.timing.interrupts_on_stop {
            let intensity = self.effective_intensity(intensity);
            self.with_effect_cx(cx, |behavior, ecx| behavior.stop(ecx, position, intensity));
        }
    }

    /// 重置
    pub fn reset(&mut self) {
        self.plays_left = self.timing.plays_per_cycle();
        self.behavior.reset();
    }

    /// 跳到终止状态
    pub fn skip_to_end(&mut self, cx: &mut FeedbackCx, position: Vec3, intensity: f32) {
        self.observe(cx);
        let intensity = self.effective_intensity(intensity);
        self.with_effect_cx(cx, |behavior, ecx| {
            behavior.skip_to_end(ecx, position, intensity)
        });
    }

    /// 每帧推进
    pub fn tick(&mut self, cx: &mut FeedbackCx) {
        self.observe(cx);
        let now = self.clock_now;
        // 先推进序列：本帧由任务新发起的序列要到下一帧才开始
        self.tick_sequence(cx, now);
        self.tick_delayed_starts(cx, now);
        self.tick_task(cx, now);
        if self.active {
            self.with_effect_cx(cx, |behavior, ecx| behavior.update(ecx));
        }
    }

    /// 宿主被禁用
    pub fn on_disable(&mut self) {
        self.behavior.on_disable();
    }

    /// 宿主被销毁
    pub fn on_destroy(&mut self) {
        self.behavior.on_destroy();
    }

    // ========== 内部 ==========

    fn observe(&mut self, cx: &FeedbackCx) {
        self.owner = cx.owner;
        self.clock_now = cx.time.now(self.timescale(&cx.owner));
    }

    fn with_effect_cx<R>(
        &mut self,
        cx: &mut FeedbackCx,
        f: impl FnOnce(&mut dyn FeedbackBehavior, &mut EffectCx) -> R,
    ) -> R {
        let mode = self.timescale(&cx.owner);
        let delta_time = if cx.owner.skipping_to_end {
            f32::MAX
        } else {
            cx.time.delta(mode)
        };
        let normal_direction = self.normal_play_direction(cx.owner.direction);
        let mut ecx = EffectCx::new(
            &self.label,
            self.channel,
            cx.owner,
            cx.time.now(mode),
            delta_time,
            normal_direction,
            &mut *cx.rng,
            &mut *cx.events,
        );
        f(self.behavior.as_mut(), &mut ecx)
    }

    fn regular_play(&mut self, cx: &mut FeedbackCx, args: PlayArgs) {
        if self.chance <= 0.0 {
            return;
        }
        if self.chance < 100.0 {
            let roll: f32 = cx.rng.gen_range(0.0..100.0);
            if roll > self.chance {
                debug!(label = %self.label, roll, chance = self.chance, "概率判定未通过");
                return;
            }
        }

        if let Some(interval) = self.timing.intensity_interval
            && !interval.contains(args.intensity)
        {
            return;
        }

        let now = self.clock_now;
        if self.timing.repeat_forever {
            self.fire(cx, args);
            self.task = PlayTask::RepeatForever {
                next_at: now + self.cycle_wait(),
                args,
            };
            return;
        }

        if self.timing.number_of_repeats > 0 {
            self.repeat_step(cx, args);
            return;
        }

        self.fire(cx, args);
    }

    /// 有限重复的一步：消耗一次播放，必要时安排下一次
    fn repeat_step(&mut self, cx: &mut FeedbackCx, args: PlayArgs) {
        self.plays_left = self.plays_left.saturating_sub(1);
        self.fire(cx, args);
        if self.plays_left > 0 {
            self.task = PlayTask::Repeating {
                next_at: self.clock_now + self.cycle_wait(),
                args,
            };
        } else {
            self.task = PlayTask::Idle;
            self.plays_left = self.timing.plays_per_cycle();
        }
    }

    /// 触发一次：绑定了序列则启动序列，否则直接播放
    fn fire(&mut self, cx: &mut FeedbackCx, args: PlayArgs) {
        if self.timing.sequence.is_some() {
            self.sequence_runs.push(SequenceRun::Starting { args });
        } else {
            self.custom_play(cx, args);
            self.last_play_timestamp = self.clock_now;
        }
    }

    fn custom_play(&mut self, cx: &mut FeedbackCx, args: PlayArgs) {
        if self.requires_setup {
            debug!(
                label = %self.label,
                target = %self.required_target,
                "反馈缺少必需目标，跳过播放"
            );
            return;
        }
        let intensity = self.effective_intensity(args.intensity);
        self.with_effect_cx(cx, |behavior, ecx| {
            behavior.play(ecx, args.position, intensity)
        });
    }

    /// 两次触发之间的等待
    fn cycle_wait(&self) -> f32 {
        let gap = self
            .owner
            .apply_time_multiplier(self.timing.delay_between_repeats);
        match &self.timing.sequence {
            Some(sequence) => gap + sequence.length,
            None => self.feedback_duration(&self.owner) + gap,
        }
    }

    /// 触发所有到期的延迟 Play，按发起顺序
    fn tick_delayed_starts(&mut self, cx: &mut FeedbackCx, now: f32) {
        if self.delayed_starts.is_empty() {
            return;
        }
        let delay = self.owner.apply_time_multiplier(self.timing.initial_delay);
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed_starts)
            .into_iter()
            .partition(|start| now - start.started_at >= delay);
        self.delayed_starts = waiting;
        for start in due {
            self.regular_play(cx, start.args);
            self.last_play_timestamp = now;
        }
    }

    fn tick_task(&mut self, cx: &mut FeedbackCx, now: f32) {
        match self.task {
            PlayTask::Idle => {}
            PlayTask::RepeatForever { next_at, args } => {
                if now >= next_at {
                    self.fire(cx, args);
                    self.task = PlayTask::RepeatForever {
                        next_at: now + self.cycle_wait(),
                        args,
                    };
                }
            }
            PlayTask::Repeating { next_at, args } => {
                if now >= next_at {
                    self.task = PlayTask::Idle;
                    self.repeat_step(cx, args);
                }
            }
        }
    }

    fn tick_sequence(&mut self, cx: &mut FeedbackCx, now: f32) {
        let Some(sequence) = self.timing.sequence.clone() else {
            self.sequence_runs.clear();
            return;
        };
        if self.sequence_runs.is_empty() {
            return;
        }

        let runs = std::mem::take(&mut self.sequence_runs);
        let mut running = Vec::with_capacity(runs.len());
        for run in runs {
            if let Some(next) = self.advance_sequence_run(cx, &sequence, run, now) {
                running.push(next);
            }
        }
        self.sequence_runs = running;
    }

    /// 推进一次序列播放，结束时返回 None
    fn advance_sequence_run(
        &mut self,
        cx: &mut FeedbackCx,
        sequence: &Sequence,
        run: SequenceRun,
        now: f32,
    ) -> Option<SequenceRun> {
        let run = match run {
            SequenceRun::Starting { args } if self.timing.quantized => SequenceRun::Beats {
                last_beat_at: None,
                index: 0,
                args,
            },
            SequenceRun::Starting { args } => SequenceRun::Timed {
                started_at: now,
                cursor: f32::NEG_INFINITY,
                args,
            },
            other => other,
        };

        match run {
            SequenceRun::Timed {
                started_at,
                cursor,
                args,
            } => {
                let elapsed = now - started_at;
                let finished = elapsed >= sequence.length;
                // 最后一帧把剩余音符全部补上
                let until = if finished { f32::INFINITY } else { elapsed };
                let hits = sequence.notes_in_window(self.timing.track_id, cursor, until);
                for _ in 0..hits {
                    self.custom_play(cx, args);
                }
                if hits > 0 {
                    self.last_play_timestamp = now;
                }

                (!finished).then_some(SequenceRun::Timed {
                    started_at,
                    cursor: elapsed,
                    args,
                })
            }
            SequenceRun::Beats {
                last_beat_at,
                index,
                args,
            } => {
                let count = sequence.quantized_beat_count();
                if index >= count {
                    return None;
                }
                let interval = 60.0 / self.timing.target_bpm.max(1) as f32;
                if last_beat_at.is_some_and(|at| now - at < interval) {
                    return Some(run);
                }

                if sequence.quantized_hit(index, self.timing.track_id) {
                    self.custom_play(cx, args);
                    self.last_play_timestamp = now;
                }
                let next = index + 1;
                (next < count).then_some(SequenceRun::Beats {
                    last_beat_at: Some(now),
                    index: next,
                    args,
                })
            }
            SequenceRun::Starting { .. } => Some(run),
        }
    }
}
