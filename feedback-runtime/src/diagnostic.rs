//! # 诊断模块
//!
//! 对播放器和 setup 描述做静态检查，不播放、不推进时间。
//!
//! ## 设计原则
//!
//! - 播放过程对配置问题静默跳过，问题统一在这里暴露
//! - 诊断分级：Error（必须修复）、Warn（建议修复）、Info（信息提示）

use crate::feedback::{Feedback, OwnerView};
use crate::player::FeedbackPlayer;
use crate::setup::{FeedbackRegistry, PlayerSetup};

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 信息提示
    Info,
    /// 警告（建议修复）
    Warn,
    /// 错误（必须修复）
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 诊断级别
    pub level: DiagnosticLevel,
    /// 来源（播放器 ID 或 setup 文件路径）
    pub source: String,
    /// 槽位下标（如果可定位）
    pub slot: Option<usize>,
    /// 诊断消息
    pub message: String,
    /// 诊断详情（可选，如反馈标签）
    pub detail: Option<String>,
}

impl Diagnostic {
    fn with_level(
        level: DiagnosticLevel,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            source: source.into(),
            slot: None,
            message: message.into(),
            detail: None,
        }
    }

    /// 创建错误诊断
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, source, message)
    }

    /// 创建警告诊断
    pub fn warn(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warn, source, message)
    }

    /// 创建信息诊断
    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, source, message)
    }

    /// 设置槽位
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// 设置详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.source)?;
        if let Some(slot) = self.slot {
            write!(f, "#{}", slot)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  | {}", detail)?;
        }
        Ok(())
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    /// 诊断条目列表
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    /// 创建空结果
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加诊断
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// 获取错误数量
    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    /// 获取警告数量
    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    /// 是否有错误
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 按级别过滤
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }
}

/// 检查 setup 描述
///
/// 与 [`PlayerSetup::validate`] 不同，这里不会在第一个问题处停下，
/// 而是收集所有问题。
pub fn analyze_setup(
    source: &str,
    setup: &PlayerSetup,
    registry: &FeedbackRegistry,
) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();

    if let Err(e) = setup.settings.validate() {
        result.push(Diagnostic::error(source, e.to_string()));
    }

    for (name, sequence) in &setup.sequences {
        if let Err(e) = sequence.validate() {
            result.push(Diagnostic::error(source, e.to_string()).with_detail(name.as_str()));
        }
    }

    for (slot, feedback) in setup.feedbacks.iter().enumerate() {
        let label = feedback.display_label();

        if !registry.contains(&feedback.kind) {
            result.push(
                Diagnostic::warn(source, format!("未注册的反馈类型 '{}'", feedback.kind))
                    .with_slot(slot)
                    .with_detail(label),
            );
        }

        if let Err(e) = feedback.timing.validate() {
            result.push(
                Diagnostic::error(source, e.to_string())
                    .with_slot(slot)
                    .with_detail(label),
            );
        }

        if !(0.0..=100.0).contains(&feedback.chance) {
            result.push(
                Diagnostic::error(source, format!("chance 必须在 0 - 100 之间：{}", feedback.chance))
                    .with_slot(slot)
                    .with_detail(label),
            );
        }

        if let Some(name) = &feedback.sequence
            && !setup.sequences.contains_key(name)
        {
            result.push(
                Diagnostic::error(source, format!("引用了未定义的序列 '{}'", name))
                    .with_slot(slot)
                    .with_detail(label),
            );
        }
    }

    result
}

/// 检查已构建的播放器
pub fn analyze_player(player: &FeedbackPlayer) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();
    let source = player.id().to_string();
    let owner = player.owner_view();

    if let Err(e) = player.settings.validate() {
        result.push(Diagnostic::error(&source, e.to_string()));
    }

    for (slot, feedback) in player.slots().iter().enumerate() {
        let Some(feedback) = feedback else {
            result.push(
                Diagnostic::warn(&source, "空槽位，遍历到这里会中止播放")
                    .with_slot(slot)
                    .with_detail("refresh_cache 会移除空槽位"),
            );
            continue;
        };
        analyze_feedback(&mut result, &source, slot, feedback, &owner);
    }

    if player.contains_loop() && !player.feedbacks().any(has_loop_target) {
        result.push(Diagnostic::info(&source, "没有循环起点或暂停，循环会回到列表开头"));
    }

    if !player.is_empty() && !player.feedbacks().any(|f| f.active) {
        result.push(Diagnostic::info(&source, "所有反馈都未启用"));
    }

    result
}

fn analyze_feedback(
    result: &mut DiagnosticResult,
    source: &str,
    slot: usize,
    feedback: &Feedback,
    owner: &OwnerView,
) {
    let label = feedback.label.as_str();

    if feedback.requires_setup() {
        result.push(
            Diagnostic::warn(
                source,
                format!("缺少必需的目标 {}，播放时会被跳过", feedback.required_target()),
            )
            .with_slot(slot)
            .with_detail(label),
        );
    }

    if let Err(e) = feedback.timing.validate() {
        result.push(
            Diagnostic::error(source, e.to_string())
                .with_slot(slot)
                .with_detail(label),
        );
    }

    if let Some(sequence) = feedback.sequence()
        && !sequence.tracks.is_empty()
        && !sequence.tracks.iter().any(|t| t.id == feedback.timing.track_id)
    {
        result.push(
            Diagnostic::warn(
                source,
                format!(
                    "序列 '{}' 中没有轨道 {}",
                    sequence.name, feedback.timing.track_id
                ),
            )
            .with_slot(slot)
            .with_detail(label),
        );
    }

    if let Some(sequence) = feedback.sequence()
        && feedback.timing.quantized
        && (!sequence.quantized || sequence.quantized_beat_count() == 0)
    {
        result.push(
            Diagnostic::warn(
                source,
                format!("序列 '{}' 没有量化结果，量化播放不会触发任何音符", sequence.name),
            )
            .with_slot(slot)
            .with_detail(label),
        );
    }

    if feedback.active && feedback.chance <= 0.0 {
        result.push(
            Diagnostic::info(source, "chance 为 0，永远不会播放")
                .with_slot(slot)
                .with_detail(label),
        );
    }

    if feedback.timing.repeat_forever && !feedback.timing.exclude_from_holding_pauses {
        result.push(
            Diagnostic::info(source, "无限重复的反馈一直处于播放状态，播放器不会自行完成")
                .with_slot(slot)
                .with_detail(label),
        );
    }

    if feedback.active && feedback.total_duration(owner) == 0.0 && feedback.holding_pause() {
        result.push(
            Diagnostic::info(source, "保持暂停之前没有需要等待的反馈时会立即继续")
                .with_slot(slot)
                .with_detail(label),
        );
    }
}

fn has_loop_target(feedback: &Feedback) -> bool {
    feedback.active && (feedback.looper_start() || feedback.pause().is_some())
}
