//! 单元测试共用的内存实现

use axum::Router;
use chrono::{DateTime, NaiveTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        AnalysisOutcome, DriveFileRef, RiskLevel, ScanFrequency, ScanResults, ScanStatus,
        ScheduledScan,
    },
    repositories::{DueScans, ScanStore, UndecodableScan},
    services::providers::{AnalysisService, FileSourceProvider, NamedSourceProvider},
};

/// 在随机端口启动一个 axum 桩服务，返回其基础URL
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn scan(frequency: ScanFrequency, sources: &[&str], files: &[&str]) -> ScheduledScan {
    ScheduledScan {
        id: Uuid::new_v4(),
        owner_id: "user-1".to_string(),
        frequency,
        time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        drive_files: files
            .iter()
            .map(|f| DriveFileRef {
                file_id: format!("id-{}", f),
                file_name: f.to_string(),
            })
            .collect(),
        enabled: true,
        last_run: None,
        next_run: Utc::now() - chrono::Duration::minutes(5),
        status: ScanStatus::Idle,
        results: None,
    }
}

pub fn outcome(accuracy: f64) -> AnalysisOutcome {
    AnalysisOutcome {
        accuracy,
        risk_level: RiskLevel::Low,
        hallucination_count: 0,
        processing_time_ms: 10,
        synthetic: false,
    }
}

/// 内存扫描存储
#[derive(Default)]
pub struct MemoryScanStore {
    scans: Mutex<HashMap<Uuid, ScheduledScan>>,
    fail_mark_processing: Mutex<Vec<Uuid>>,
    /// 这些扫描在 fetch_due 中表现为无法解码的记录
    corrupted: Mutex<Vec<Uuid>>,
    pub processing_marks: AtomicUsize,
}

impl MemoryScanStore {
    pub fn with_scans(scans: Vec<ScheduledScan>) -> Self {
        let store = Self::default();
        {
            let mut map = store.scans.lock().unwrap();
            for scan in scans {
                map.insert(scan.id, scan);
            }
        }
        store
    }

    pub fn get(&self, id: Uuid) -> ScheduledScan {
        self.scans.lock().unwrap()[&id].clone()
    }

    pub fn fail_mark_processing_for(&self, id: Uuid) {
        self.fail_mark_processing.lock().unwrap().push(id);
    }

    pub fn corrupt(&self, id: Uuid) {
        self.corrupted.lock().unwrap().push(id);
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut ScheduledScan)) -> AppResult<()> {
        let mut map = self.scans.lock().unwrap();
        let scan = map
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("扫描: {}", id)))?;
        f(scan);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScanStore for MemoryScanStore {
    async fn fetch_due(&self, now: DateTime<Utc>) -> AppResult<DueScans> {
        let mut due: Vec<_> = self
            .scans
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_run);

        let corrupted = self.corrupted.lock().unwrap().clone();
        let (broken, scans): (Vec<_>, Vec<_>) =
            due.into_iter().partition(|s| corrupted.contains(&s.id));
        Ok(DueScans {
            scans,
            undecodable: broken
                .into_iter()
                .map(|s| UndecodableScan {
                    id: s.id,
                    frequency: None,
                    time_of_day: None,
                    reason: "扫描记录无法解码: drive_files".to_string(),
                })
                .collect(),
        })
    }

    async fn mark_processing(&self, id: Uuid) -> AppResult<()> {
        self.processing_marks.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark_processing.lock().unwrap().contains(&id) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.update(id, |s| s.status = ScanStatus::Processing)
    }

    async fn record_success(
        &self,
        id: Uuid,
        outcome: &AnalysisOutcome,
        ran_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> AppResult<()> {
        let results = ScanResults::Outcome(outcome.clone()).to_json();
        self.update(id, |s| {
            s.status = ScanStatus::Completed;
            s.last_run = Some(ran_at);
            s.next_run = next_run;
            s.results = Some(results);
        })
    }

    async fn record_error(
        &self,
        id: Uuid,
        message: &str,
        ran_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> AppResult<()> {
        let results = ScanResults::Error {
            message: message.to_string(),
        }
        .to_json();
        self.update(id, |s| {
            s.status = ScanStatus::Error;
            s.last_run = Some(ran_at);
            s.next_run = next_run;
            s.results = Some(results);
        })
    }

    async fn record_skipped(&self, id: Uuid, next_run: DateTime<Utc>) -> AppResult<()> {
        let results = ScanResults::Skipped {
            reason: "no sources".to_string(),
        }
        .to_json();
        self.update(id, |s| {
            s.status = ScanStatus::Skipped;
            s.next_run = next_run;
            s.results = Some(results);
        })
    }
}

/// 记录同时进行中的调用数及其峰值
#[derive(Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard<'a>(&'a InFlightGauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 可编排的内容源：默认返回 "content of {id}"，可按ID指定失败状态码或延迟
#[derive(Default)]
pub struct ScriptedSources {
    failures: HashMap<String, Option<u16>>,
    texts: HashMap<String, String>,
    delay: Duration,
    gauge: Option<Arc<InFlightGauge>>,
    pub calls: AtomicUsize,
}

impl ScriptedSources {
    pub fn failing(mut self, id: &str, status: Option<u16>) -> Self {
        self.failures.insert(id.to_string(), status);
        self
    }

    pub fn text(mut self, id: &str, text: &str) -> Self {
        self.texts.insert(id.to_string(), text.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn gauge(mut self, gauge: Arc<InFlightGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    async fn fetch(&self, id: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.gauge.as_ref().map(|g| g.enter());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(status) = self.failures.get(id) {
            return Err(AppError::remote(*status, format!("{} unavailable", id)));
        }
        Ok(self
            .texts
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("content of {}", id)))
    }
}

#[async_trait::async_trait]
impl FileSourceProvider for ScriptedSources {
    async fn fetch_drive_file(&self, file_id: &str) -> AppResult<String> {
        self.fetch(file_id).await
    }
}

#[async_trait::async_trait]
impl NamedSourceProvider for ScriptedSources {
    async fn fetch_source(&self, source_id: &str) -> AppResult<String> {
        self.fetch(source_id).await
    }
}

/// 一次分析调用的记录
#[derive(Debug, Clone)]
pub struct AnalysisCall {
    pub text: String,
    pub started: Instant,
    pub ended: Instant,
}

type AnalysisFn = Box<dyn Fn(&str) -> AppResult<AnalysisOutcome> + Send + Sync>;

/// 可编排的分析服务
pub struct ScriptedAnalysis {
    respond: AnalysisFn,
    delay: Duration,
    gauge: Option<Arc<InFlightGauge>>,
    calls: Mutex<Vec<AnalysisCall>>,
}

impl ScriptedAnalysis {
    pub fn with<F>(respond: F) -> Self
    where
        F: Fn(&str) -> AppResult<AnalysisOutcome> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            gauge: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::with(|_| Ok(outcome(88.0)))
    }

    pub fn failing(status: Option<u16>) -> Self {
        Self::with(move |_| Err(AppError::remote(status, "analysis failed")))
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn gauge(mut self, gauge: Arc<InFlightGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> Vec<AnalysisCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze(&self, text: &str) -> AppResult<AnalysisOutcome> {
        let _in_flight = self.gauge.as_ref().map(|g| g.enter());
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.respond)(text);
        self.calls.lock().unwrap().push(AnalysisCall {
            text: text.to_string(),
            started,
            ended: Instant::now(),
        });
        result
    }
}
