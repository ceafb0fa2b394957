use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 扫描批处理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// 每批并发执行的扫描数
    pub batch_size: u32,
    /// 批次之间的间隔（毫秒）
    pub inter_batch_delay_ms: u64,
    /// 单次扫描轮次的总时限（秒），为空表示不限
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// 是否在进程内定时触发扫描轮次
    pub trigger_enabled: bool,
    /// 进程内触发间隔（秒）
    pub trigger_interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay_ms: 500,
            deadline_secs: None,
            trigger_enabled: false,
            trigger_interval_secs: 300,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 || self.batch_size > 100 {
            return Err("批量大小应在1-100之间".into());
        }
        if self.inter_batch_delay_ms > 60_000 {
            return Err("批次间隔不应超过1分钟".into());
        }
        if self.deadline_secs == Some(0) {
            return Err("扫描轮次时限必须大于0".into());
        }
        if self.trigger_enabled && self.trigger_interval_secs < 60 {
            return Err("触发间隔不应少于1分钟".into());
        }
        Ok(())
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
