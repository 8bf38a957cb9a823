//! # Settings 模块
//!
//! 播放器的全局参数。
//!
//! 所有字段都有默认值，setup 文件里只需写出与默认不同的部分。

use serde::{Deserialize, Serialize};

use crate::clock::TimescaleMode;
use crate::error::SetupError;
use crate::feedback::Direction;

/// 初始化时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationMode {
    /// 由调用方手动调用 `initialize`
    Script,
    /// 宿主 awake 时
    Awake,
    /// 宿主 start 时
    #[default]
    Start,
}

/// 播放器设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// 初始化时机
    #[serde(default)]
    pub initialization_mode: InitializationMode,

    /// start 时自动播放
    #[serde(default)]
    pub auto_play_on_start: bool,

    /// enable 时自动播放
    #[serde(default)]
    pub auto_play_on_enable: bool,

    /// disable 时强制停止所有反馈
    #[serde(default = "default_true")]
    pub force_stop_on_disable: bool,

    /// 是否允许播放
    #[serde(default = "default_true")]
    pub can_play: bool,

    /// 正在播放时是否允许再次播放
    #[serde(default = "default_true")]
    pub can_play_while_already_playing: bool,

    /// 冷却时长（秒，播放器时钟）
    #[serde(default)]
    pub cooldown_duration: f32,

    /// 初始延迟（秒，非缩放时间）
    #[serde(default)]
    pub initial_delay: f32,

    /// 播放概率（0-100）
    #[serde(default = "default_chance")]
    pub chance_to_play: f32,

    /// 默认播放强度
    #[serde(default = "default_one")]
    pub feedbacks_intensity: f32,

    /// 时长倍率
    #[serde(default = "default_one")]
    pub duration_multiplier: f32,

    /// 遍历方向
    #[serde(default)]
    pub direction: Direction,

    /// 播放结束后自动翻转方向
    #[serde(default)]
    pub auto_change_direction_on_end: bool,

    /// 播放器自身的时钟（冷却、保持暂停、完成判定）
    #[serde(default = "default_player_timescale")]
    pub player_timescale_mode: TimescaleMode,

    /// 强制所有反馈使用的时间模式
    #[serde(default)]
    pub forced_timescale: Option<TimescaleMode>,
}

fn default_true() -> bool {
    true
}

fn default_chance() -> f32 {
    100.0
}

fn default_one() -> f32 {
    1.0
}

fn default_player_timescale() -> TimescaleMode {
    TimescaleMode::Unscaled
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            initialization_mode: InitializationMode::default(),
            auto_play_on_start: false,
            auto_play_on_enable: false,
            force_stop_on_disable: true,
            can_play: true,
            can_play_while_already_playing: true,
            cooldown_duration: 0.0,
            initial_delay: 0.0,
            chance_to_play: default_chance(),
            feedbacks_intensity: default_one(),
            duration_multiplier: default_one(),
            direction: Direction::default(),
            auto_change_direction_on_end: false,
            player_timescale_mode: default_player_timescale(),
            forced_timescale: None,
        }
    }
}

impl PlayerSettings {
    /// 验证设置有效性
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.cooldown_duration < 0.0 {
            return Err(SetupError::InvalidSettings {
                message: format!("cooldown_duration 不能为负数：{}", self.cooldown_duration),
            });
        }

        if self.initial_delay < 0.0 {
            return Err(SetupError::InvalidSettings {
                message: format!("initial_delay 不能为负数：{}", self.initial_delay),
            });
        }

        if !(0.0..=100.0).contains(&self.chance_to_play) {
            return Err(SetupError::InvalidSettings {
                message: format!("chance_to_play 必须在 0 - 100 之间：{}", self.chance_to_play),
            });
        }

        if self.duration_multiplier < 0.0 {
            return Err(SetupError::InvalidSettings {
                message: format!(
                    "duration_multiplier 不能为负数：{}",
                    self.duration_multiplier
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PlayerSettings::default();
        assert!(settings.can_play);
        assert!(settings.can_play_while_already_playing);
        assert_eq!(settings.chance_to_play, 100.0);
        assert_eq!(settings.player_timescale_mode, TimescaleMode::Unscaled);
        assert_eq!(settings.initialization_mode, InitializationMode::Start);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: PlayerSettings = serde_json::from_str(
            r#"{"cooldown_duration":2.0,"direction":"bottom_to_top","forced_timescale":"scaled"}"#,
        )
        .unwrap();
        assert_eq!(settings.cooldown_duration, 2.0);
        assert_eq!(settings.direction, Direction::BottomToTop);
        assert_eq!(settings.forced_timescale, Some(TimescaleMode::Scaled));
        assert!(settings.force_stop_on_disable);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = PlayerSettings {
            chance_to_play: 150.0,
            ..PlayerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SetupError::InvalidSettings { .. })
        ));

        let settings = PlayerSettings {
            duration_multiplier: -1.0,
            ..PlayerSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
