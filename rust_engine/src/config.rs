//! MMDAgent 运行时配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 运行时配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct AgentConfig {
    // ========== 动作缓存 ==========
    /// MotionStocker 中允许保留的未使用动作数量，默认 10
    /// 超过此数量时从最久未使用的一端开始释放
    pub motion_cache_size: usize,

    // ========== 时间 ==========
    /// 每秒帧数，默认 30.0（MMD 标准）
    /// 无键名的表情控制用它把秒数换算为帧数
    pub frame_rate: f64,

    // ========== KeyValue ==========
    /// KeyValue 最多可保存的键数量，默认 4096
    pub keyvalue_max_entries: usize,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            motion_cache_size: 10,
            frame_rate: 30.0,
            keyvalue_max_entries: 4096,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static AGENT_CONFIG: Lazy<RwLock<AgentConfig>> = Lazy::new(|| RwLock::new(AgentConfig::default()));

/// 获取当前配置（只读）
///
/// 锁被毒化时退回到最后写入的值。
pub fn get_config() -> AgentConfig {
    match AGENT_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: AgentConfig) {
    match AGENT_CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(AgentConfig::default());
}
