//! # Simulate 模块
//!
//! 无画面的宿主：按固定帧率推进时钟，驱动播放器，把信号落到一个极简场景上。
//!
//! 场景只认识两类信号：
//!
//! - `position:<目标>.<轴>`：写入目标坐标
//! - `time_scale`：修改时钟缩放
//!
//! 其余信号原样记入时间线。

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use feedback_runtime::{
    Clock, DiagnosticResult, FeedbackPlayer, FeedbackRegistry, FeedbackSignal, InitializationMode,
    PlayerEvent, PlayerId, PlayerSetup, Vec3,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 演示文件：场景目标 + 播放器描述
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoFile {
    /// 场景中的具名目标及其初始坐标
    #[serde(default)]
    pub scene: BTreeMap<String, Vec3>,

    #[serde(flatten)]
    pub setup: PlayerSetup,
}

impl DemoFile {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("演示文件解析失败")
    }
}

/// 极简场景
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub objects: BTreeMap<String, Vec3>,
}

impl Scene {
    pub fn new(objects: BTreeMap<String, Vec3>) -> Self {
        Self { objects }
    }

    pub fn get(&self, name: &str) -> Option<Vec3> {
        self.objects.get(name).copied()
    }

    /// 应用一个位移信号，返回是否被场景接受
    fn apply_position(&mut self, signal: &FeedbackSignal) -> bool {
        let Some(path) = signal.name.strip_prefix("position:") else {
            return false;
        };
        let Some((target, axis)) = path.rsplit_once('.') else {
            warn!(signal = %signal.name, "位移信号缺少坐标轴");
            return false;
        };
        let Some(object) = self.objects.get_mut(target) else {
            warn!(object = target, source = %signal.source, "场景中没有该目标");
            return false;
        };
        match axis {
            "x" => object.x = signal.value,
            "y" => object.y = signal.value,
            "z" => object.z = signal.value,
            other => {
                warn!(axis = other, "未知坐标轴");
                return false;
            }
        }
        true
    }
}

/// 模拟参数
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    /// 模拟时长（秒）
    pub seconds: f32,
    pub fps: u32,
    /// 随机种子，None 时随机生成
    pub seed: Option<u64>,
    /// 以 `play_in_reverse` 触发
    pub reverse: bool,
    /// 覆盖播放强度
    pub intensity: Option<f32>,
    /// 初始时钟缩放
    pub time_scale: f32,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            seconds: 3.0,
            fps: 60,
            seed: None,
            reverse: false,
            intensity: None,
            time_scale: 1.0,
        }
    }
}

/// 时间线中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// 非缩放时间
    pub time: f32,
    pub frame: u64,
    pub event: PlayerEvent,
}

impl fmt::Display for TimelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>7.3}s #{:<5} {}", self.time, self.frame, self.event)
    }
}

/// 模拟结果
#[derive(Debug)]
pub struct SimulationReport {
    pub timeline: Vec<TimelineEntry>,
    /// 模拟结束时的场景
    pub scene: Scene,
    /// 构建时产生的诊断
    pub diagnostics: DiagnosticResult,
    /// 实际使用的随机种子
    pub seed: u64,
    /// 播放器是否发出过 complete
    pub completed: bool,
}

impl SimulationReport {
    pub fn signal_count(&self) -> usize {
        self.timeline
            .iter()
            .filter(|entry| matches!(entry.event, PlayerEvent::Signal(_)))
            .count()
    }
}

/// 运行一次模拟
pub fn simulate(
    demo: &DemoFile,
    registry: &FeedbackRegistry,
    options: &SimulationOptions,
) -> anyhow::Result<SimulationReport> {
    if options.fps == 0 {
        anyhow::bail!("fps 必须大于 0");
    }

    let seed = options.seed.unwrap_or_else(rand::random);
    let built = demo
        .setup
        .build(PlayerId::new(1), registry)
        .context("构建播放器失败")?;
    let mut player = built.player.with_seed(seed);
    info!(seed, feedbacks = player.len(), "开始模拟");

    start_player(&mut player, options);

    let mut clock = Clock::new();
    clock.set_time_scale(options.time_scale);
    let mut scene = Scene::new(demo.scene.clone());
    let mut timeline = Vec::new();
    let mut completed = false;

    let dt = 1.0 / options.fps as f32;
    let frames = (options.seconds / dt).ceil().max(0.0) as u64;

    for _ in 0..frames {
        let frame = clock.advance(dt);
        for event in player.tick(frame) {
            match &event {
                PlayerEvent::Signal(signal) if signal.name == "time_scale" => {
                    debug!(scale = signal.value, "修改时钟缩放");
                    clock.set_time_scale(signal.value);
                }
                PlayerEvent::Signal(signal) => {
                    scene.apply_position(signal);
                }
                PlayerEvent::Complete { .. } => completed = true,
                _ => {}
            }
            timeline.push(TimelineEntry {
                time: frame.unscaled_time,
                frame: frame.frame_count,
                event,
            });
        }
    }

    if !completed {
        warn!(seconds = options.seconds, "模拟结束时播放器仍未完成");
    }

    Ok(SimulationReport {
        timeline,
        scene,
        diagnostics: built.diagnostics,
        seed,
        completed,
    })
}

/// 按宿主生命周期启动播放器，没有自动播放时手动触发一次
fn start_player(player: &mut FeedbackPlayer, options: &SimulationOptions) {
    player.awake();
    if player.settings.initialization_mode == InitializationMode::Script {
        player.initialize();
    }
    player.on_enable();
    player.start();

    if player.settings.auto_play_on_start || player.settings.auto_play_on_enable {
        return;
    }
    if options.reverse {
        player.play_in_reverse();
    } else {
        let intensity = options
            .intensity
            .unwrap_or(player.settings.feedbacks_intensity);
        player.play_at(player.position, intensity);
    }
}
