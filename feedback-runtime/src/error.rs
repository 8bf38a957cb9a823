//! # Error 模块
//!
//! 定义 feedback-runtime 中使用的错误类型。
//!
//! 播放过程本身不返回错误（配置问题以静默跳过 + 诊断标记的方式处理），
//! 这里的错误只出现在加载、校验、量化等可失败的路径上。

use thiserror::Error;

/// 时间策略校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimingError {
    /// 时长为负数
    #[error("字段 '{field}' 不能为负数：{value}")]
    NegativeDuration { field: &'static str, value: f32 },

    /// 强度区间上下限颠倒
    #[error("强度区间无效：min {min} 大于 max {max}")]
    InvertedIntensityInterval { min: f32, max: f32 },

    /// 量化播放时 BPM 为 0
    #[error("量化播放需要大于 0 的 target_bpm")]
    ZeroBpm,
}

/// 序列错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    /// 序列没有任何音符
    #[error("序列 '{name}' 没有任何音符")]
    Empty { name: String },

    /// BPM 为 0
    #[error("序列 '{name}' 的 BPM 必须大于 0")]
    ZeroBpm { name: String },

    /// 结尾静音时长为负数
    #[error("序列 '{name}' 的结尾静音时长不能为负数：{value}")]
    NegativeSilence { name: String, value: f32 },
}

/// 配置（setup 文件）加载错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    /// JSON 解析失败
    #[error("setup 解析失败: {message}")]
    Json { message: String },

    /// 引用了未定义的序列
    #[error("反馈 '{label}' 引用了未定义的序列 '{sequence}'")]
    UnknownSequence { label: String, sequence: String },

    /// 时间策略无效
    #[error("反馈 '{label}' 的时间策略无效: {source}")]
    InvalidTiming {
        label: String,
        #[source]
        source: TimingError,
    },

    /// 反馈参数无效
    #[error("反馈 '{label}' 的参数无效: {message}")]
    InvalidParams { label: String, message: String },

    /// 播放器设置无效
    #[error("播放器设置无效: {message}")]
    InvalidSettings { message: String },

    /// 序列无效
    #[error("序列无效: {0}")]
    Sequence(#[from] SequenceError),
}

impl From<serde_json::Error> for SetupError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
        }
    }
}

/// feedback-runtime 统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedbackError {
    /// 时间策略错误
    #[error("时间策略错误: {0}")]
    Timing(#[from] TimingError),

    /// 序列错误
    #[error("序列错误: {0}")]
    Sequence(#[from] SequenceError),

    /// setup 错误
    #[error("setup 错误: {0}")]
    Setup(#[from] SetupError),
}

/// Result 类型别名
pub type FeedbackResult<T> = Result<T, FeedbackError>;
