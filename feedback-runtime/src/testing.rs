//! 单元测试共用的探针反馈、计数随机数源和时钟夹具。

use std::cell::Cell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::clock::Clock;
use crate::event::PlayerEvent;
use crate::feedback::{EffectCx, FeedbackBehavior, FeedbackCx, OwnerView};
use crate::vector::Vec3;

/// 记录调用次数的反馈
#[derive(Debug, Clone)]
pub struct Probe {
    pub duration: f32,
    required: Option<&'static str>,
    plays: Rc<Cell<u32>>,
    stops: Rc<Cell<u32>>,
    resets: Rc<Cell<u32>>,
    skips: Rc<Cell<u32>>,
    last_intensity: Rc<Cell<f32>>,
}

impl Probe {
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            required: None,
            plays: Rc::default(),
            stops: Rc::default(),
            resets: Rc::default(),
            skips: Rc::default(),
            last_intensity: Rc::default(),
        }
    }

    pub fn requiring(mut self, target: &'static str) -> Self {
        self.required = Some(target);
        self
    }

    pub fn plays(&self) -> u32 {
        self.plays.get()
    }

    pub fn stops(&self) -> u32 {
        self.stops.get()
    }

    pub fn resets(&self) -> u32 {
        self.resets.get()
    }

    pub fn skips(&self) -> u32 {
        self.skips.get()
    }

    pub fn last_intensity(&self) -> f32 {
        self.last_intensity.get()
    }
}

impl FeedbackBehavior for Probe {
    fn kind(&self) -> &'static str {
        "probe"
    }

    fn play(&mut self, _cx: &mut EffectCx, _position: Vec3, intensity: f32) {
        self.plays.set(self.plays.get() + 1);
        self.last_intensity.set(intensity);
    }

    fn stop(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        self.stops.set(self.stops.get() + 1);
    }

    fn reset(&mut self) {
        self.resets.set(self.resets.get() + 1);
    }

    fn skip_to_end(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {
        self.skips.set(self.skips.get() + 1);
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn evaluate_requires_setup(&self) -> bool {
        self.required.is_some()
    }

    fn required_target(&self) -> &str {
        self.required.unwrap_or("")
    }
}

/// 统计抽取次数的随机数源
pub struct CountingRng {
    inner: StdRng,
    draws: Rc<Cell<u32>>,
}

impl CountingRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            draws: Rc::default(),
        }
    }

    /// 共享的计数器，随机数源被移交给播放器后仍可读取
    pub fn counter(&self) -> Rc<Cell<u32>> {
        self.draws.clone()
    }

    pub fn draws(&self) -> u32 {
        self.draws.get()
    }

    fn count(&self) {
        self.draws.set(self.draws.get() + 1);
    }
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.count();
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.count();
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.count();
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.count();
        self.inner.try_fill_bytes(dest)
    }
}

/// 单个反馈的测试夹具
pub struct Harness {
    pub clock: Clock,
    pub rng: CountingRng,
    pub events: Vec<PlayerEvent>,
    pub owner: OwnerView,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            rng: CountingRng::new(7),
            events: Vec::new(),
            owner: OwnerView::default(),
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.clock.advance(dt);
    }

    pub fn cx(&mut self) -> FeedbackCx<'_> {
        FeedbackCx::new(
            self.owner,
            self.clock.frame(),
            &mut self.rng,
            &mut self.events,
        )
    }
}
