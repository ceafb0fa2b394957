use chrono::{NaiveTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    time::{Instant, sleep},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::{AnalysisConfig, SweepConfig},
    error::AppResult,
    models::{
        AnalysisOutcome, ContentSection, ExecutionStats, ScanFrequency, ScanOutcome, ScheduledScan,
    },
    repositories::{DueScans, ScanStore},
    services::{
        content_aggregator::ContentAggregator, dispatcher::BoundedDispatcher,
        providers::AnalysisService, run_scheduler::next_run,
    },
};

/// 扫描轮次参数
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    /// 整个轮次的时限，从轮次开始计时
    pub deadline: Option<Duration>,
    pub fallback_on_exhaustion: bool,
}

impl SweepSettings {
    pub fn from_config(sweep: &SweepConfig, analysis: &AnalysisConfig) -> Self {
        Self {
            batch_size: sweep.batch_size.max(1) as usize,
            inter_batch_delay: sweep.inter_batch_delay(),
            deadline: sweep.deadline(),
            fallback_on_exhaustion: analysis.fallback_on_exhaustion,
        }
    }
}

/// 扫描编排器：一次调用即一个扫描轮次
///
/// 到期扫描按 next_run 升序分批，批次之间严格串行，批内扫描并发执行。
/// 每个扫描的失败都在其流水线边界内被转换为错误状态，不会中断轮次。
#[derive(Clone)]
pub struct ScanOrchestrator {
    store: Arc<dyn ScanStore>,
    aggregator: ContentAggregator,
    dispatcher: Arc<BoundedDispatcher>,
    analysis: Arc<dyn AnalysisService>,
    settings: SweepSettings,
    /// 同一时刻只允许一个轮次执行
    sweep_lock: Arc<Mutex<()>>,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<dyn ScanStore>,
        aggregator: ContentAggregator,
        dispatcher: Arc<BoundedDispatcher>,
        analysis: Arc<dyn AnalysisService>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            store,
            aggregator,
            dispatcher,
            analysis,
            settings,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// 执行一个扫描轮次并返回统计
    pub async fn run_sweep(&self) -> AppResult<ExecutionStats> {
        let _guard = self.sweep_lock.lock().await;
        let started_at = Utc::now();
        let deadline = self.settings.deadline.map(|d| Instant::now() + d);
        let mut stats = ExecutionStats::begin(started_at);

        let DueScans { scans: due, undecodable } = self.store.fetch_due(started_at).await?;
        for broken in &undecodable {
            // 读不出调度字段时按每小时重排
            let outcome = self
                .record_failure(
                    broken.id,
                    broken.frequency.unwrap_or(ScanFrequency::Hourly),
                    broken.time_of_day.unwrap_or(NaiveTime::MIN),
                    &broken.reason,
                )
                .await;
            stats.record(outcome);
        }

        if due.is_empty() {
            debug!("没有可执行的到期扫描");
            stats.finish(Utc::now());
            return Ok(stats);
        }

        let batch_size = self.settings.batch_size.max(1);
        let batches: Vec<&[ScheduledScan]> = due.chunks(batch_size).collect();
        info!(
            "开始扫描轮次: {} 个到期扫描，分 {} 批执行",
            due.len(),
            batches.len()
        );

        for (index, batch) in batches.iter().enumerate() {
            let wait = if index > 0 {
                self.settings.inter_batch_delay
            } else {
                Duration::ZERO
            };

            if !deadline_allows(deadline, wait) {
                let remaining: usize = batches[index..].iter().map(|b| b.len()).sum();
                warn!(
                    "扫描轮次已到时限，剩余 {} 批共 {} 个扫描顺延到下一轮",
                    batches.len() - index,
                    remaining
                );
                for _ in 0..remaining {
                    stats.record(ScanOutcome::Deferred);
                }
                break;
            }

            if !wait.is_zero() {
                sleep(wait).await;
            }

            info!(
                "执行第 {}/{} 批，共 {} 个扫描",
                index + 1,
                batches.len(),
                batch.len()
            );
            for outcome in self.run_batch(batch, deadline).await {
                stats.record(outcome);
            }
        }

        stats.finish(Utc::now());
        info!(
            "扫描轮次完成: 总数={}, 成功={}, 失败={}, 跳过={}, 合成={}, 顺延={}, 耗时={}ms",
            stats.total_scans,
            stats.succeeded,
            stats.errored,
            stats.skipped,
            stats.synthetic,
            stats.deferred,
            stats.total_duration_ms
        );
        Ok(stats)
    }

    /// 批内扫描各自独立执行，全部结束后返回
    async fn run_batch(
        &self,
        batch: &[ScheduledScan],
        deadline: Option<Instant>,
    ) -> Vec<ScanOutcome> {
        let handles: Vec<_> = batch
            .iter()
            .cloned()
            .map(|scan| {
                let key = (scan.id, scan.frequency, scan.time_of_day);
                let orchestrator = self.clone();
                let handle =
                    tokio::spawn(async move { orchestrator.run_scan(scan, deadline).await });
                (key, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for ((id, frequency, time_of_day), handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(scan_id = %id, "扫描任务异常终止: {}", e);
                    self.record_failure(
                        id,
                        frequency,
                        time_of_day,
                        &format!("扫描任务异常终止: {}", e),
                    )
                    .await
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_scan(&self, scan: ScheduledScan, deadline: Option<Instant>) -> ScanOutcome {
        match self.execute(&scan, deadline).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_failure(scan.id, scan.frequency, scan.time_of_day, &e.to_string())
                    .await
            }
        }
    }

    /// 单个扫描的流水线：标记处理中 -> 收集内容 -> 分析 -> 持久化
    async fn execute(
        &self,
        scan: &ScheduledScan,
        deadline: Option<Instant>,
    ) -> AppResult<ScanOutcome> {
        self.store.mark_processing(scan.id).await?;

        let sections = self.aggregator.gather(scan, deadline).await;
        if sections.is_empty() {
            let next = next_run(scan.frequency, scan.time_of_day, Utc::now());
            self.store.record_skipped(scan.id, next).await?;
            info!(scan_id = %scan.id, next_run = %next, "扫描未配置任何数据源，已跳过");
            return Ok(ScanOutcome::Skipped);
        }

        let payload = ContentSection::join(&sections);
        let label = format!("准确性分析[{}]", scan.id);
        let started = Instant::now();

        let outcome = match self
            .dispatcher
            .submit_until(&label, deadline, || self.analysis.analyze(&payload))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_exhausted() && self.settings.fallback_on_exhaustion => {
                warn!(scan_id = %scan.id, "分析服务重试耗尽，使用合成结果: {}", e);
                AnalysisOutcome::synthetic(started.elapsed().as_millis() as u64)
            }
            Err(e) => return Err(e.into()),
        };

        let ran_at = Utc::now();
        let next = next_run(scan.frequency, scan.time_of_day, ran_at);
        self.store
            .record_success(scan.id, &outcome, ran_at, next)
            .await?;

        info!(
            scan_id = %scan.id,
            accuracy = outcome.accuracy,
            synthetic = outcome.synthetic,
            next_run = %next,
            "扫描完成"
        );
        Ok(ScanOutcome::Succeeded {
            synthetic: outcome.synthetic,
        })
    }

    /// 失败路径：无论失败发生在哪一步都推进 next_run
    async fn record_failure(
        &self,
        id: Uuid,
        frequency: ScanFrequency,
        time_of_day: NaiveTime,
        message: &str,
    ) -> ScanOutcome {
        let ran_at = Utc::now();
        let next = next_run(frequency, time_of_day, ran_at);

        warn!(scan_id = %id, next_run = %next, "扫描失败: {}", message);
        if let Err(e) = self.store.record_error(id, message, ran_at, next).await {
            error!(scan_id = %id, "记录扫描失败状态失败: {}", e);
        }
        ScanOutcome::Errored
    }
}

fn deadline_allows(deadline: Option<Instant>, wait: Duration) -> bool {
    deadline.is_none_or(|d| Instant::now() + wait < d)
}
