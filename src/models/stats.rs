use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 单个扫描在一轮中的最终归类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Succeeded { synthetic: bool },
    Errored,
    Skipped,
    /// 时限已到，本轮未启动
    Deferred,
}

/// 一轮扫描的执行统计
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionStats {
    pub total_scans: u32,
    pub succeeded: u32,
    pub errored: u32,
    pub skipped: u32,
    /// 成功中由回退策略合成的数量
    pub synthetic: u32,
    pub deferred: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_ms: u64,
}

impl ExecutionStats {
    pub fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            total_scans: 0,
            succeeded: 0,
            errored: 0,
            skipped: 0,
            synthetic: 0,
            deferred: 0,
            started_at,
            ended_at: None,
            total_duration_ms: 0,
        }
    }

    pub fn record(&mut self, outcome: ScanOutcome) {
        self.total_scans += 1;
        match outcome {
            ScanOutcome::Succeeded { synthetic } => {
                self.succeeded += 1;
                if synthetic {
                    self.synthetic += 1;
                }
            }
            ScanOutcome::Errored => self.errored += 1,
            ScanOutcome::Skipped => self.skipped += 1,
            ScanOutcome::Deferred => self.deferred += 1,
        }
    }

    pub fn finish(&mut self, ended_at: DateTime<Utc>) {
        self.total_duration_ms = ended_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.ended_at = Some(ended_at);
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.total_scans - self.deferred;
        if attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / attempted as f64
        }
    }
}
