//! # Config 模块
//!
//! CLI 配置（`feedback-cli.json`）。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件
//! 3. 默认值（最低）

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// CLI 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// 模拟帧率
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// 默认随机种子（None 表示每次运行随机）
    #[serde(default)]
    pub seed: Option<u64>,

    /// 日志过滤（`tracing_subscriber::EnvFilter` 语法）
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// 默认模拟时长（秒）
    #[serde(default = "default_seconds")]
    pub seconds: f32,
}

fn default_fps() -> u32 {
    60
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_seconds() -> f32 {
    3.0
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            seed: None,
            log_filter: default_log_filter(),
            seconds: default_seconds(),
        }
    }
}

impl CliConfig {
    /// 加载配置文件
    ///
    /// 文件不存在时静默使用默认配置；解析失败时打印警告并使用默认配置。
    /// 此时日志还没有初始化，所以直接写 stderr。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => config,
                    Err(e) => {
                        eprintln!("⚠️ 配置文件无效: {e}，使用默认配置");
                        Self::default()
                    }
                },
                Err(e) => {
                    eprintln!("⚠️ 配置文件解析失败: {e}，使用默认配置");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("⚠️ 配置文件读取失败: {e}，使用默认配置");
                Self::default()
            }
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fps == 0 || self.fps > 1000 {
            anyhow::bail!("fps 必须在 1 - 1000 之间：{}", self.fps);
        }
        if self.seconds.is_nan() || self.seconds <= 0.0 {
            anyhow::bail!("seconds 必须大于 0：{}", self.seconds);
        }
        if self.log_filter.trim().is_empty() {
            anyhow::bail!("log_filter 不能为空");
        }
        Ok(())
    }
}
