use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 远程调用调度器配置（并发槽位 + 重试退避）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 进程内同时执行的远程调用上限
    pub max_concurrent: u32,
    /// 最大尝试次数（含首次调用），3 表示首次调用加至多 2 次重试
    #[serde(alias = "max_retries")]
    pub max_attempts: u32,
    /// 初始退避时间（毫秒），第 n 次失败后等待 base * 2^(n-1)
    pub base_delay_ms: u64,
    /// 单次退避上限（毫秒）
    pub max_delay_ms: u64,
    /// 添加随机抖动以避免惊群效应
    pub jitter: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

impl DispatcherConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("最大并发数必须大于0".to_string());
        }

        if self.max_attempts == 0 {
            return Err("最大尝试次数必须大于0".to_string());
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err("退避上限不能小于初始退避时间".to_string());
        }

        Ok(())
    }

    /// 第 attempt 次失败后的退避时长（不含抖动）
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}
