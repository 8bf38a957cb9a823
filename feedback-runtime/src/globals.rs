//! # Globals 模块
//!
//! 所有播放器共享的全局开关。

use std::cell::Cell;
use std::rc::Rc;

/// 全局开关句柄
///
/// 克隆得到的句柄共享同一个开关；关闭后所有持有它的播放器都会拒绝 Play。
#[derive(Debug, Clone)]
pub struct FeedbackGlobals {
    enabled: Rc<Cell<bool>>,
}

impl Default for FeedbackGlobals {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackGlobals {
    /// 创建开启状态的开关
    pub fn new() -> Self {
        Self {
            enabled: Rc::new(Cell::new(true)),
        }
    }

    /// 是否允许播放
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// 设置开关
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }
}
