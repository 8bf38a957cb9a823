//! # Behavior 模块
//!
//! 具体反馈实现的接口。
//!
//! [`Feedback`](super::Feedback) 负责所有共享的时间逻辑（延迟、重复、冷却、序列），
//! 具体反馈只实现 [`FeedbackBehavior`] 中的钩子和少量能力查询：
//!
//! - 生命周期钩子：`initialize` / `play` / `stop` / `reset` / `skip_to_end` / `update`
//! - 时长：`duration`（未乘倍率的单次时长）
//! - 编排标记：`pause` / `holding_pause` / `looper_pause` / `looper_start` / `script_driven_pause`
//! - 配置诊断：`evaluate_requires_setup` / `required_target`

use std::any::Any;

use super::context::EffectCx;
use crate::event::SignalId;
use crate::vector::Vec3;

/// 阻塞式暂停的等待条件
#[derive(Debug, Clone, PartialEq)]
pub enum PauseWait {
    /// 等待指定秒数（按播放器时钟）
    Seconds(f32),
    /// 等待外部信号
    Signal(SignalId),
}

/// 循环标记的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooperInfo {
    /// 剩余循环次数
    pub loops_left: u32,
    /// 是否无限循环
    pub infinite: bool,
    /// 回跳到最近的（时长大于 0 的）暂停
    pub loop_at_last_pause: bool,
    /// 回跳到最近的循环起点
    pub loop_at_last_loop_start: bool,
}

impl LooperInfo {
    /// 是否还需要回跳
    pub fn should_loop(&self) -> bool {
        self.loops_left > 0 || self.infinite
    }
}

/// 具体反馈实现
pub trait FeedbackBehavior: Any {
    /// 类型名（与 setup 中的 `type` 对应）
    fn kind(&self) -> &'static str;

    /// 初始化钩子
    fn initialize(&mut self, _cx: &mut EffectCx) {}

    /// 播放钩子
    fn play(&mut self, cx: &mut EffectCx, position: Vec3, intensity: f32);

    /// 中断钩子（`interrupts_on_stop` 为 true 时调用）
    fn stop(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {}

    /// 重置钩子，未播放过也必须可以调用
    fn reset(&mut self) {}

    /// 直接跳到终止状态
    fn skip_to_end(&mut self, _cx: &mut EffectCx, _position: Vec3, _intensity: f32) {}

    /// 每帧更新
    fn update(&mut self, _cx: &mut EffectCx) {}

    /// 宿主被禁用
    fn on_disable(&mut self) {}

    /// 宿主被销毁
    fn on_destroy(&mut self) {}

    /// 单次播放时长（秒，未乘时长倍率）
    fn duration(&self) -> f32 {
        0.0
    }

    /// 阻塞式暂停
    fn pause(&self) -> Option<PauseWait> {
        None
    }

    /// 是否为保持暂停
    fn holding_pause(&self) -> bool {
        false
    }

    /// 是否为循环回跳点
    fn looper_pause(&self) -> bool {
        false
    }

    /// 是否为循环起点
    fn looper_start(&self) -> bool {
        false
    }

    /// 循环状态（仅循环回跳点返回）
    fn looper(&self) -> Option<LooperInfo> {
        None
    }

    /// 脚本暂停：返回自动恢复时长（0 表示只能手动恢复）
    fn script_driven_pause(&self) -> Option<f32> {
        None
    }

    /// 是否缺少必需的外部目标
    fn evaluate_requires_setup(&self) -> bool {
        false
    }

    /// 缺少的目标名称
    fn required_target(&self) -> &str {
        ""
    }
}
