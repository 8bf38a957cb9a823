//! # Setup 模块
//!
//! 从 JSON 描述构建播放器。
//!
//! ```json
//! {
//!   "settings": { "direction": "top_to_bottom", "cooldown_duration": 0.5 },
//!   "sequences": { "drums": { "notes": [{ "timestamp": 0.0, "id": 1 }], "tracks": [{ "id": 1 }] } },
//!   "feedbacks": [
//!     { "type": "camera_shake", "label": "Shake", "timing": { "number_of_repeats": 2 } },
//!     { "type": "pause", "params": { "pause_duration": 0.5 } },
//!     { "type": "flash", "sequence": "drums", "timing": { "track_id": 1 } }
//!   ]
//! }
//! ```
//!
//! 具体反馈通过 [`FeedbackRegistry`] 按 `type` 创建，`params` 原样交给工厂函数。
//! 无法识别的 `type` 不会导致加载失败，而是留下一个空槽位并产生一条警告诊断。

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diagnostic::{Diagnostic, DiagnosticResult};
use crate::effects::{HoldingPauseEffect, LooperEffect, LooperStartEffect, PauseEffect};
use crate::error::SetupError;
use crate::event::PlayerId;
use crate::feedback::{Feedback, FeedbackBehavior};
use crate::player::{FeedbackPlayer, PlayerSettings};
use crate::sequence::Sequence;
use crate::timing::FeedbackTiming;

/// 反馈工厂：`params` → 具体实现
pub type BehaviorFactory = fn(serde_json::Value) -> Result<Box<dyn FeedbackBehavior>, String>;

/// 反馈类型注册表
#[derive(Clone, Default)]
pub struct FeedbackRegistry {
    factories: BTreeMap<String, BehaviorFactory>,
}

impl std::fmt::Debug for FeedbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl FeedbackRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册了内置编排标记（暂停、保持暂停、循环）的注册表
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_serde::<PauseEffect>("pause");
        registry.register_serde::<HoldingPauseEffect>("holding_pause");
        registry.register_serde::<LooperEffect>("looper");
        registry.register_serde::<LooperStartEffect>("looper_start");
        registry
    }

    /// 注册工厂函数，同名类型会被覆盖
    pub fn register(&mut self, kind: impl Into<String>, factory: BehaviorFactory) {
        let kind = kind.into();
        if self.factories.insert(kind.clone(), factory).is_some() {
            debug!(kind = %kind, "覆盖已注册的反馈类型");
        }
    }

    /// 注册一个直接由 `params` 反序列化得到的类型
    pub fn register_serde<T>(&mut self, kind: impl Into<String>)
    where
        T: FeedbackBehavior + DeserializeOwned,
    {
        self.register(kind, deserialize_behavior::<T>);
    }

    /// 是否注册了指定类型
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// 所有已注册的类型名（按字母序）
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// 创建具体实现，类型未注册时返回 `None`
    pub fn create(
        &self,
        kind: &str,
        params: serde_json::Value,
    ) -> Option<Result<Box<dyn FeedbackBehavior>, String>> {
        self.factories.get(kind).map(|factory| factory(params))
    }
}

fn deserialize_behavior<T>(params: serde_json::Value) -> Result<Box<dyn FeedbackBehavior>, String>
where
    T: FeedbackBehavior + DeserializeOwned,
{
    // 省略 params 等同于全部使用默认值
    let params = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value::<T>(params)
        .map(|behavior| Box::new(behavior) as Box<dyn FeedbackBehavior>)
        .map_err(|e| e.to_string())
}

/// 单个反馈的描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSetup {
    /// 注册表中的类型名
    #[serde(rename = "type")]
    pub kind: String,

    /// 标签，缺省时使用类型名
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    /// 播放概率（0-100）
    #[serde(default = "default_chance")]
    pub chance: f32,

    #[serde(default)]
    pub channel: i32,

    #[serde(default)]
    pub timing: FeedbackTiming,

    /// 绑定的序列名称（`sequences` 中的键）
    #[serde(default)]
    pub sequence: Option<String>,

    /// 具体实现的参数
    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_true() -> bool {
    true
}

fn default_chance() -> f32 {
    100.0
}

impl FeedbackSetup {
    /// 显示用的标签
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.kind)
    }
}

/// 播放器描述
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerSetup {
    #[serde(default)]
    pub settings: PlayerSettings,

    /// 具名序列，按名称被反馈引用
    #[serde(default)]
    pub sequences: BTreeMap<String, Sequence>,

    #[serde(default)]
    pub feedbacks: Vec<FeedbackSetup>,
}

/// 构建结果
#[derive(Debug)]
pub struct BuiltPlayer {
    pub player: FeedbackPlayer,
    /// 构建过程中产生的非致命问题
    pub diagnostics: DiagnosticResult,
}

impl PlayerSetup {
    /// 解析 JSON
    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 校验设置、时间策略与序列引用
    pub fn validate(&self) -> Result<(), SetupError> {
        self.settings.validate()?;

        for feedback in &self.feedbacks {
            let label = feedback.display_label();

            feedback
                .timing
                .validate()
                .map_err(|source| SetupError::InvalidTiming {
                    label: label.to_string(),
                    source,
                })?;

            if !(0.0..=100.0).contains(&feedback.chance) {
                return Err(SetupError::InvalidParams {
                    label: label.to_string(),
                    message: format!("chance 必须在 0 - 100 之间：{}", feedback.chance),
                });
            }

            if let Some(name) = &feedback.sequence
                && !self.sequences.contains_key(name)
            {
                return Err(SetupError::UnknownSequence {
                    label: label.to_string(),
                    sequence: name.clone(),
                });
            }
        }

        Ok(())
    }

    /// 准备所有序列：排序、计算长度，标记为量化的序列同时完成量化
    pub fn prepare_sequences(&self) -> Result<BTreeMap<String, Rc<Sequence>>, SetupError> {
        let mut prepared = BTreeMap::new();
        for (name, sequence) in &self.sequences {
            let mut sequence = sequence.clone();
            if sequence.name.is_empty() {
                sequence.name = name.clone();
            }
            sequence.validate()?;
            sequence.sort_original_sequence();
            if sequence.quantized {
                sequence.quantize_original_sequence()?;
            } else {
                sequence.compute_length();
            }
            prepared.insert(name.clone(), Rc::new(sequence));
        }
        Ok(prepared)
    }

    /// 构建播放器（未初始化，由调用方按初始化模式驱动生命周期）
    pub fn build(&self, id: PlayerId, registry: &FeedbackRegistry) -> Result<BuiltPlayer, SetupError> {
        self.validate()?;
        let sequences = self.prepare_sequences()?;

        let mut player = FeedbackPlayer::new(id).with_settings(self.settings.clone());
        let mut diagnostics = DiagnosticResult::new();
        let source = id.to_string();

        for (slot, setup) in self.feedbacks.iter().enumerate() {
            let label = setup.display_label();

            let behavior = match registry.create(&setup.kind, setup.params.clone()) {
                Some(Ok(behavior)) => behavior,
                Some(Err(message)) => {
                    return Err(SetupError::InvalidParams {
                        label: label.to_string(),
                        message,
                    });
                }
                None => {
                    warn!(player = %id, slot, kind = %setup.kind, "未注册的反馈类型，留下空槽位");
                    diagnostics.push(
                        Diagnostic::warn(&source, format!("未注册的反馈类型 '{}'", setup.kind))
                            .with_slot(slot)
                            .with_detail(label),
                    );
                    player.add_empty_slot();
                    continue;
                }
            };

            let mut timing = setup.timing.clone();
            if let Some(name) = &setup.sequence {
                let sequence = sequences.get(name).ok_or_else(|| SetupError::UnknownSequence {
                    label: label.to_string(),
                    sequence: name.clone(),
                })?;
                timing.sequence = Some(Rc::clone(sequence));
            }

            let feedback = Feedback::from_boxed(label, behavior)
                .with_timing(timing)
                .with_active(setup.active)
                .with_chance(setup.chance)
                .with_channel(setup.channel);
            player.add_feedback(feedback);
        }

        debug!(player = %id, slots = player.len(), "setup 构建完成");
        Ok(BuiltPlayer {
            player,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Direction;
    use crate::testing::Probe;

    fn registry() -> FeedbackRegistry {
        let mut registry = FeedbackRegistry::with_builtin();
        registry.register("probe", |params| {
            let duration = params
                .get("duration")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0) as f32;
            Ok(Box::new(Probe::new(duration)) as Box<dyn FeedbackBehavior>)
        });
        registry
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = FeedbackRegistry::with_builtin();
        let kinds: Vec<&str> = registry.kinds().collect();
        assert_eq!(kinds, vec!["holding_pause", "looper", "looper_start", "pause"]);
        assert!(!registry.contains("flash"));
    }

    #[test]
    fn test_build_from_json() {
        let setup = PlayerSetup::from_json(
            r#"{
                "settings": { "direction": "bottom_to_top" },
                "feedbacks": [
                    { "type": "probe", "label": "A", "params": { "duration": 1.5 } },
                    { "type": "pause", "params": { "pause_duration": 0.25 } },
                    { "type": "looper", "params": { "number_of_loops": 3 } }
                ]
            }"#,
        )
        .unwrap();

        let built = setup.build(PlayerId::new(1), &registry()).unwrap();
        assert!(built.diagnostics.is_empty());

        let player = built.player;
        assert_eq!(player.direction(), Direction::BottomToTop);
        assert_eq!(player.len(), 3);
        assert_eq!(player.feedback(0).map(|f| f.label.as_str()), Some("A"));
        assert_eq!(player.feedback(1).map(|f| f.label.as_str()), Some("pause"));
        assert_eq!(
            player.feedback_of_type::<PauseEffect>().map(|p| p.pause_duration),
            Some(0.25)
        );
        assert_eq!(
            player.feedback_of_type::<LooperEffect>().map(|l| l.number_of_loops),
            Some(3)
        );
        assert!(player.contains_loop());
    }

    #[test]
    fn test_unknown_type_leaves_empty_slot() {
        let setup = PlayerSetup::from_json(
            r#"{ "feedbacks": [ { "type": "probe" }, { "type": "laser", "label": "Zap" } ] }"#,
        )
        .unwrap();

        let built = setup.build(PlayerId::new(1), &registry()).unwrap();
        assert_eq!(built.player.len(), 2);
        assert!(built.player.slots()[1].is_none());
        assert_eq!(built.diagnostics.warn_count(), 1);
        assert_eq!(built.diagnostics.diagnostics[0].slot, Some(1));
    }

    #[test]
    fn test_unknown_sequence_rejected() {
        let setup = PlayerSetup::from_json(
            r#"{ "feedbacks": [ { "type": "probe", "label": "A", "sequence": "drums" } ] }"#,
        )
        .unwrap();

        let err = setup.build(PlayerId::new(1), &registry()).unwrap_err();
        assert_eq!(
            err,
            SetupError::UnknownSequence {
                label: "A".to_string(),
                sequence: "drums".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_timing_rejected() {
        let setup = PlayerSetup::from_json(
            r#"{ "feedbacks": [ { "type": "probe", "timing": { "initial_delay": -1.0 } } ] }"#,
        )
        .unwrap();

        let err = setup.validate().unwrap_err();
        assert!(matches!(err, SetupError::InvalidTiming { ref label, .. } if label == "probe"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let setup = PlayerSetup::from_json(
            r#"{ "feedbacks": [ { "type": "pause", "params": { "pause_duration": "long" } } ] }"#,
        )
        .unwrap();

        let err = setup.build(PlayerId::new(1), &registry()).unwrap_err();
        assert!(matches!(err, SetupError::InvalidParams { .. }));
    }

    #[test]
    fn test_sequences_prepared_and_bound() {
        let setup = PlayerSetup::from_json(
            r#"{
                "sequences": {
                    "drums": {
                        "notes": [
                            { "timestamp": 0.99, "id": 1 },
                            { "timestamp": 0.02, "id": 1 },
                            { "timestamp": 0.51, "id": 1 }
                        ],
                        "tracks": [{ "id": 1 }],
                        "end_silence_duration": 0.6,
                        "quantized": true,
                        "target_bpm": 120
                    }
                },
                "feedbacks": [
                    { "type": "probe", "label": "Kick", "sequence": "drums", "timing": { "track_id": 1 } }
                ]
            }"#,
        )
        .unwrap();

        let built = setup.build(PlayerId::new(1), &registry()).unwrap();
        let sequence = built
            .player
            .feedback(0)
            .and_then(Feedback::sequence)
            .cloned()
            .unwrap();

        assert_eq!(sequence.name, "drums");
        assert_eq!(sequence.notes[0].timestamp, 0.02);
        assert!((sequence.length - 1.59).abs() < 1e-5);
        assert_eq!(sequence.quantized_beat_count(), 3);
        assert!((0..3).all(|beat| sequence.quantized_hit(beat, 1)));
    }

    #[test]
    fn test_malformed_json() {
        let err = PlayerSetup::from_json("{ \"feedbacks\": [ ").unwrap_err();
        assert!(matches!(err, SetupError::Json { .. }));
    }
}
