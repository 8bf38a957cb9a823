//! # Player 模块
//!
//! 反馈播放器：持有有序的反馈列表，负责整体的播放、停止、暂停、循环、翻转与完成判定。
//!
//! ## 执行模型
//!
//! ```text
//! play() ──► 门控检查 ──► reset 所有反馈 ──► [初始延迟] ──► dispatch
//!                                                          │
//!                     ┌────────────── 没有暂停 ─────────────┤
//!                     ▼                                     ▼
//!            所有反馈同时播放                        逐项遍历（walk 模块）
//!            按总时长 + 仍在播放判定完成             按暂停 / 保持 / 循环推进
//!
//! tick(frame) ──► 推进各反馈的任务 ──► 推进跳到结尾 ──► 推进播放阶段 ──► Vec<PlayerEvent>
//! ```
//!
//! 播放器不读取真实时间，所有时间都来自 Host 传入的 [`FrameTime`]。

mod settings;
mod walk;


pub use settings::{InitializationMode, PlayerSettings};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, trace};

use crate::clock::FrameTime;
use crate::event::{PlayerEvent, PlayerId};
use crate::feedback::{Direction, Feedback, FeedbackBehavior, FeedbackCx, OwnerView, PlayArgs};
use crate::globals::FeedbackGlobals;
use crate::vector::Vec3;
use walk::PlayPhase;

/// 跳到结尾后，再经过多少帧停止
const SKIP_TO_END_FRAMES: u8 = 2;

/// 反馈播放器
pub struct FeedbackPlayer {
    id: PlayerId,
    /// 全局参数
    pub settings: PlayerSettings,
    /// 宿主位置（`play()` 的默认播放位置）
    pub position: Vec3,

    feedbacks: Vec<Option<Feedback>>,
    globals: FeedbackGlobals,
    rng: Box<dyn RngCore>,
    events: Vec<PlayerEvent>,
    frame: FrameTime,

    initialized: bool,
    host_active: bool,
    is_playing: bool,
    times_played: u32,
    in_script_driven_pause: bool,
    should_revert_on_next_play: bool,
    contains_loop: bool,
    requires_setup: bool,
    skipping_to_the_end: bool,
    skip_frames_left: Option<u8>,

    start_time: f32,
    last_play_at: Option<f32>,
    total_duration_snapshot: f32,
    holding_max: f32,
    holding_since: f32,
    phase: PlayPhase,
}

impl std::fmt::Debug for FeedbackPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackPlayer")
            .field("id", &self.id)
            .field("feedbacks", &self.feedbacks)
            .field("is_playing", &self.is_playing)
            .field("direction", &self.settings.direction)
            .field("phase", &self.phase)
            .finish()
    }
}

impl FeedbackPlayer {
    /// 创建播放器
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            settings: PlayerSettings::default(),
            position: Vec3::zero(),
            feedbacks: Vec::new(),
            globals: FeedbackGlobals::new(),
            rng: Box::new(StdRng::from_entropy()),
            events: Vec::new(),
            frame: FrameTime::default(),
            initialized: false,
            host_active: true,
            is_playing: false,
            times_played: 0,
            in_script_driven_pause: false,
            should_revert_on_next_play: false,
            contains_loop: false,
            requires_setup: false,
            skipping_to_the_end: false,
            skip_frames_left: None,
            start_time: 0.0,
            last_play_at: None,
            total_duration_snapshot: 0.0,
            holding_max: 0.0,
            holding_since: 0.0,
            phase: PlayPhase::Idle,
        }
    }

    /// 设置全局参数
    pub fn with_settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 使用共享的全局开关
    pub fn with_globals(mut self, globals: FeedbackGlobals) -> Self {
        self.globals = globals;
        self
    }

    /// 使用指定的随机数源
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// 使用固定种子
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    // ========== 状态查询 ==========

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn direction(&self) -> Direction {
        self.settings.direction
    }

    pub fn times_played(&self) -> u32 {
        self.times_played
    }

    pub fn in_script_driven_pause(&self) -> bool {
        self.in_script_driven_pause
    }

    pub fn should_revert_on_next_play(&self) -> bool {
        self.should_revert_on_next_play
    }

    pub fn contains_loop(&self) -> bool {
        self.contains_loop
    }

    pub fn skipping_to_the_end(&self) -> bool {
        self.skipping_to_the_end
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 是否有反馈缺少必需的外部目标
    pub fn requires_setup(&self) -> bool {
        self.requires_setup
    }

    /// 最近一帧的时间
    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    /// 播放器时钟的当前时间
    pub fn now(&self) -> f32 {
        self.frame.now(self.settings.player_timescale_mode)
    }

    /// 本次播放已经过的时间（未播放时为 0）
    pub fn elapsed_time(&self) -> f32 {
        if self.is_playing {
            self.now() - self.start_time
        } else {
            0.0
        }
    }

    /// 总时长：初始延迟 + 所有启用反馈中最长的总时长
    pub fn total_duration(&self) -> f32 {
        let owner = self.owner_view();
        let longest = self
            .feedbacks
            .iter()
            .flatten()
            .filter(|f| f.active)
            .map(|f| f.total_duration(&owner))
            .fold(0.0, f32::max);
        self.settings.initial_delay + longest
    }

    /// 是否还有（参与保持暂停的）反馈在播放
    pub fn has_feedback_still_playing(&self) -> bool {
        self.feedbacks
            .iter()
            .flatten()
            .any(|f| f.is_playing() && !f.timing.exclude_from_holding_pauses)
    }

    /// 传给反馈的播放器快照
    pub fn owner_view(&self) -> OwnerView {
        OwnerView {
            player: self.id,
            direction: self.settings.direction,
            duration_multiplier: self.settings.duration_multiplier,
            forced_timescale: self.settings.forced_timescale,
            skipping_to_end: self.skipping_to_the_end,
        }
    }

    // ========== 列表 ==========

    /// 槽位数量（包括空槽位）
    pub fn len(&self) -> usize {
        self.feedbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feedbacks.is_empty()
    }

    /// 所有槽位
    pub fn slots(&self) -> &[Option<Feedback>] {
        &self.feedbacks
    }

    /// 所有非空反馈
    pub fn feedbacks(&self) -> impl Iterator<Item = &Feedback> {
        self.feedbacks.iter().flatten()
    }

    /// 指定下标的反馈
    pub fn feedback(&self, index: usize) -> Option<&Feedback> {
        self.feedbacks.get(index)?.as_ref()
    }

    /// 指定下标的反馈（可变）
    pub fn feedback_mut(&mut self, index: usize) -> Option<&mut Feedback> {
        self.feedbacks.get_mut(index)?.as_mut()
    }

    /// 按标签查找反馈
    pub fn find_feedback(&self, label: &str) -> Option<&Feedback> {
        self.feedbacks().find(|f| f.label == label)
    }

    /// 第一个指定类型的具体实现
    pub fn feedback_of_type<T: FeedbackBehavior>(&self) -> Option<&T> {
        self.feedbacks().find_map(|f| f.downcast_ref::<T>())
    }

    /// 第一个指定类型且标签匹配的具体实现
    pub fn feedback_of_type_labeled<T: FeedbackBehavior>(&self, label: &str) -> Option<&T> {
        self.feedbacks()
            .filter(|f| f.label == label)
            .find_map(|f| f.downcast_ref::<T>())
    }

    /// 所有指定类型的具体实现
    pub fn feedbacks_of_type<T: FeedbackBehavior>(&self) -> Vec<&T> {
        self.feedbacks()
            .filter_map(|f| f.downcast_ref::<T>())
            .collect()
    }

    /// 第一个指定类型的具体实现（可变）
    pub fn feedback_of_type_mut<T: FeedbackBehavior>(&mut self) -> Option<&mut T> {
        self.feedbacks
            .iter_mut()
            .flatten()
            .find_map(|f| f.downcast_mut::<T>())
    }

    /// 添加反馈，返回其下标
    ///
    /// 播放器已初始化时，新反馈会立即初始化。
    pub fn add_feedback(&mut self, mut feedback: Feedback) -> usize {
        feedback.cache_requires_setup();
        if self.initialized {
            let owner = self.owner_view();
            let mut cx = FeedbackCx::new(owner, self.frame, self.rng.as_mut(), &mut self.events);
            feedback.initialize(&mut cx);
        }
        self.feedbacks.push(Some(feedback));
        self.after_list_change();
        self.feedbacks.len() - 1
    }

    /// 添加一个空槽位（如 setup 中无法识别的反馈）
    pub fn add_empty_slot(&mut self) -> usize {
        self.feedbacks.push(None);
        self.feedbacks.len() - 1
    }

    /// 移除指定下标的槽位，下标越界时返回 `None`
    pub fn remove_feedback(&mut self, index: usize) -> Option<Feedback> {
        if index >= self.feedbacks.len() {
            return None;
        }
        let removed = self.feedbacks.remove(index);
        self.after_list_change();
        removed
    }

    /// 清理缓存：移除空槽位、修正时长倍率、重新计算诊断标记
    pub fn refresh_cache(&mut self) {
        self.settings.duration_multiplier = self.settings.duration_multiplier.max(0.0);
        let before = self.feedbacks.len();
        self.feedbacks.retain(Option::is_some);
        if self.feedbacks.len() != before {
            debug!(
                player = %self.id,
                removed = before - self.feedbacks.len(),
                "移除空槽位"
            );
        }
        for feedback in self.feedbacks.iter_mut().flatten() {
            feedback.cache_requires_setup();
        }
        self.after_list_change();
    }

    fn after_list_change(&mut self) {
        self.check_for_loops();
        let requires_setup = self.feedbacks().any(Feedback::requires_setup);
        self.requires_setup = requires_setup;
    }

    fn check_for_loops(&mut self) {
        let contains_loop = self.feedbacks().any(|f| f.looper_pause() && f.active);
        self.contains_loop = contains_loop;
    }

    fn slot(&self, index: isize) -> Option<&Feedback> {
        usize::try_from(index).ok().and_then(|i| self.feedback(i))
    }

    fn with_feedback<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Feedback, &mut FeedbackCx) -> R,
    ) -> Option<R> {
        let owner = self.owner_view();
        let time = self.frame;
        let feedback = self.feedbacks.get_mut(index)?.as_mut()?;
        let mut cx = FeedbackCx::new(owner, time, self.rng.as_mut(), &mut self.events);
        Some(f(feedback, &mut cx))
    }

    fn for_each_feedback(&mut self, mut f: impl FnMut(&mut Feedback, &mut FeedbackCx)) {
        let owner = self.owner_view();
        let time = self.frame;
        for feedback in self.feedbacks.iter_mut().flatten() {
            let mut cx = FeedbackCx::new(owner, time, self.rng.as_mut(), &mut self.events);
            f(feedback, &mut cx);
        }
    }

    // ========== 生命周期 ==========

    /// 初始化播放器和所有反馈（可重复调用）
    pub fn initialize(&mut self) {
        trace!(player = %self.id, "初始化播放器");
        self.skipping_to_the_end = false;
        self.skip_frames_left = None;
        self.is_playing = false;
        self.last_play_at = None;
        self.phase = PlayPhase::Idle;
        self.for_each_feedback(|feedback, cx| feedback.initialize(cx));
        self.initialized = true;
        self.after_list_change();
    }

    /// 宿主 awake
    pub fn awake(&mut self) {
        if self.settings.initialization_mode == InitializationMode::Awake {
            self.initialize();
        }
    }

    /// 宿主 start
    pub fn start(&mut self) {
        if self.settings.initialization_mode == InitializationMode::Start {
            self.initialize();
        }
        if self.settings.auto_play_on_start {
            self.play();
        }
    }

    /// 宿主 enable
    pub fn on_enable(&mut self) {
        self.host_active = true;
        if self.settings.auto_play_on_enable {
            self.play();
        }
        for feedback in self.feedbacks.iter_mut().flatten() {
            feedback.cache_requires_setup();
        }
        self.after_list_change();
    }

    /// 宿主 disable
    pub fn on_disable(&mut self) {
        self.host_active = false;
        if !self.is_playing {
            return;
        }
        if self.settings.force_stop_on_disable {
            self.stop();
        }
        self.phase = PlayPhase::Idle;
        self.skip_frames_left = None;
        for feedback in self.feedbacks.iter_mut().rev().flatten() {
            feedback.on_disable();
        }
    }

    /// 宿主 destroy
    pub fn on_destroy(&mut self) {
        self.is_playing = false;
        self.phase = PlayPhase::Idle;
        for feedback in self.feedbacks.iter_mut().flatten() {
            feedback.on_destroy();
        }
    }

    /// 宿主是否处于激活状态
    pub fn is_host_active(&self) -> bool {
        self.host_active
    }

    // ========== 播放 ==========

    /// 在宿主位置以默认强度播放
    pub fn play(&mut self) {
        self.play_at(self.position, self.settings.feedbacks_intensity);
    }

    /// 在指定位置以指定强度播放
    pub fn play_at(&mut self, position: Vec3, intensity: f32) {
        self.play_internal(position, intensity, false);
    }

    /// 翻转方向后播放
    pub fn play_in_reverse(&mut self) {
        self.play_internal(self.position, self.settings.feedbacks_intensity, true);
    }

    /// 仅当本次播放将是反向时播放
    pub fn play_only_if_reversed(&mut self) {
        let reversed = match self.settings.direction {
            Direction::BottomToTop => !self.should_revert_on_next_play,
            Direction::TopToBottom => self.should_revert_on_next_play,
        };
        if reversed {
            self.play();
        }
    }

    /// 仅当方向为正向时播放
    pub fn play_only_if_normal_direction(&mut self) {
        if self.settings.direction == Direction::TopToBottom {
            self.play();
        }
    }

    fn play_internal(&mut self, position: Vec3, intensity: f32, force_revert: bool) {
        if !self.settings.can_play {
            debug!(player = %self.id, "can_play 为 false，忽略播放");
            return;
        }
        if self.is_playing && !self.settings.can_play_while_already_playing {
            debug!(player = %self.id, "正在播放，忽略播放");
            return;
        }
        if !self.evaluate_chance() {
            debug!(player = %self.id, "概率判定未通过");
            return;
        }

        let now = self.now();
        if self.settings.cooldown_duration > 0.0
            && let Some(last) = self.last_play_at
            && now - last < self.settings.cooldown_duration
        {
            debug!(player = %self.id, "冷却中，忽略播放");
            return;
        }

        self.skipping_to_the_end = false;
        if !self.globals.enabled() {
            debug!(player = %self.id, "全局开关已关闭，忽略播放");
            return;
        }
        if !self.host_active {
            debug!(player = %self.id, "宿主未激活，忽略播放");
            return;
        }

        if self.should_revert_on_next_play {
            self.revert();
            self.should_revert_on_next_play = false;
        }
        if force_revert {
            self.settings.direction = self.settings.direction.flipped();
        }

        self.reset_feedbacks();
        self.is_playing = true;
        self.times_played += 1;
        self.start_time = now;
        self.last_play_at = Some(now);
        self.holding_since = now;
        self.total_duration_snapshot = self.total_duration();
        trace!(
            player = %self.id,
            direction = ?self.settings.direction,
            total_duration = self.total_duration_snapshot,
            "开始播放"
        );

        let args = PlayArgs {
            position,
            intensity,
        };
        if self.settings.initial_delay > 0.0 {
            self.phase = PlayPhase::InitialDelay {
                started_at: self.frame.unscaled_time,
                args,
            };
        } else {
            self.prepare_play(args);
        }
    }

    fn evaluate_chance(&mut self) -> bool {
        let chance = self.settings.chance_to_play;
        if chance <= 0.0 {
            return false;
        }
        if chance < 100.0 {
            let roll: f32 = self.rng.gen_range(0.0..100.0);
            if roll > chance {
                return false;
            }
        }
        true
    }

    fn prepare_play(&mut self, args: PlayArgs) {
        self.events.push(PlayerEvent::Play { player: self.id });
        self.holding_max = 0.0;

        let direction = self.settings.direction;
        let pause_found = self.feedbacks().any(|f| {
            f.active
                && f.should_play_in_direction(direction)
                && (f.pause().is_some() || f.holding_pause() || f.looper_pause())
        });

        if pause_found {
            self.start_walk(args);
        } else {
            self.for_each_feedback(|feedback, cx| {
                if feedback.should_play_in_direction(direction) {
                    feedback.play(cx, args.position, args.intensity);
                }
            });
            self.phase = PlayPhase::Simultaneous { should_stop: false };
        }
    }

    fn complete(&mut self) {
        self.is_playing = false;
        self.phase = PlayPhase::Idle;
        self.events.push(PlayerEvent::Complete { player: self.id });
        if self.settings.auto_change_direction_on_end {
            self.should_revert_on_next_play = true;
        }
        trace!(player = %self.id, "播放完成");
    }

    // ========== 控制 ==========

    /// 停止播放并停止所有反馈
    pub fn stop(&mut self) {
        self.stop_at(self.position, self.settings.feedbacks_intensity, true);
    }

    /// 停止播放
    ///
    /// `stop_feedbacks` 为 false 时只停止遍历，已经在播放的反馈继续。
    pub fn stop_at(&mut self, position: Vec3, intensity: f32, stop_feedbacks: bool) {
        if stop_feedbacks {
            self.for_each_feedback(|feedback, cx| feedback.stop(cx, position, intensity));
        }
        self.is_playing = false;
        self.phase = PlayPhase::Idle;
        self.skip_frames_left = None;
    }

    /// 重置所有启用的反馈
    pub fn reset_feedbacks(&mut self) {
        for feedback in self.feedbacks.iter_mut().flatten() {
            if feedback.active {
                feedback.reset();
            }
        }
        self.is_playing = false;
    }

    /// 翻转方向
    pub fn revert(&mut self) {
        self.events.push(PlayerEvent::Revert { player: self.id });
        self.settings.direction = self.settings.direction.flipped();
    }

    /// 进入脚本暂停
    pub fn pause_feedbacks(&mut self) {
        self.events.push(PlayerEvent::Pause { player: self.id });
        self.in_script_driven_pause = true;
    }

    /// 解除脚本暂停
    pub fn resume_feedbacks(&mut self) {
        self.events.push(PlayerEvent::Resume { player: self.id });
        self.in_script_driven_pause = false;
    }

    /// 所有反馈跳到终止状态，两帧后停止
    pub fn skip_to_the_end(&mut self) {
        self.skipping_to_the_end = true;
        self.events.push(PlayerEvent::Skip { player: self.id });
        let (position, intensity) = (self.position, self.settings.feedbacks_intensity);
        self.for_each_feedback(|feedback, cx| {
            if feedback.active {
                feedback.skip_to_end(cx, position, intensity);
            }
        });
        self.skip_frames_left = Some(SKIP_TO_END_FRAMES);
    }

    /// 设置是否允许播放
    pub fn set_can_play(&mut self, can_play: bool) {
        self.settings.can_play = can_play;
    }

    /// 发送信号，解除等待该信号的暂停
    ///
    /// 返回信号是否被当前的暂停接收。
    pub fn signal(&mut self, id: &str) -> bool {
        self.deliver_signal(id)
    }

    // ========== 帧推进 ==========

    /// 推进一帧，返回本帧产生的事件
    pub fn tick(&mut self, time: FrameTime) -> Vec<PlayerEvent> {
        self.frame = time;

        self.for_each_feedback(|feedback, cx| feedback.tick(cx));

        if let Some(frames) = self.skip_frames_left {
            if frames <= 1 {
                self.skip_frames_left = None;
                self.skipping_to_the_end = false;
                self.stop();
            } else {
                self.skip_frames_left = Some(frames - 1);
            }
        }

        match std::mem::take(&mut self.phase) {
            PlayPhase::Idle => {}
            PlayPhase::InitialDelay { started_at, args } => {
                if self.frame.unscaled_time - started_at >= self.settings.initial_delay {
                    self.prepare_play(args);
                } else {
                    self.phase = PlayPhase::InitialDelay { started_at, args };
                }
            }
            PlayPhase::Simultaneous { should_stop } => self.tick_simultaneous(should_stop),
            walk @ PlayPhase::Walk(_) => {
                self.phase = walk;
                self.run_walk();
            }
        }

        self.take_events()
    }

    fn tick_simultaneous(&mut self, should_stop: bool) {
        if should_stop {
            if self.has_feedback_still_playing() {
                self.phase = PlayPhase::Simultaneous { should_stop };
            } else {
                self.complete();
            }
            return;
        }
        if !self.is_playing {
            return;
        }
        let should_stop = self.now() - self.start_time > self.total_duration_snapshot;
        self.phase = PlayPhase::Simultaneous { should_stop };
    }

    /// 取走排队的事件
    pub fn take_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }
}
