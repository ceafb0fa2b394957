use crate::services::scan_orchestrator::ScanOrchestrator;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// 进程内的扫描轮次触发器，外部调度器不可用时使用
#[derive(Clone)]
pub struct SweepPoller {
    orchestrator: ScanOrchestrator,
    interval_secs: u64,
}

impl SweepPoller {
    pub fn new(orchestrator: ScanOrchestrator, interval_secs: u64) -> Self {
        Self {
            orchestrator,
            interval_secs,
        }
    }

    pub async fn start(self) {
        info!("扫描轮次触发器已启动，间隔 {} 秒", self.interval_secs);
        let mut ticker = interval(Duration::from_secs(self.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick_once().await;
        }
    }

    async fn tick_once(&self) {
        match self.orchestrator.run_sweep().await {
            Ok(stats) if stats.total_scans == 0 => debug!("本次触发没有到期扫描"),
            Ok(stats) => debug!(
                total = stats.total_scans,
                duration_ms = stats.total_duration_ms,
                "定时扫描轮次结束"
            ),
            Err(e) => warn!(error = %e, "定时扫描轮次执行失败"),
        }
    }
}
