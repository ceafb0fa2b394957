use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::{AnalysisOutcome, DriveFileRef, ScanFrequency, ScanResults, ScheduledScan},
};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::{
    Row,
    postgres::{PgArguments, PgRow},
    types::Json,
};
use tracing::error;
use uuid::Uuid;

/// 到期扫描查询结果
#[derive(Debug, Default)]
pub struct DueScans {
    /// 按 next_run 升序
    pub scans: Vec<ScheduledScan>,
    /// 能读出ID但其余字段无法解码的记录，由引擎走失败路径推进其 next_run
    pub undecodable: Vec<UndecodableScan>,
}

impl DueScans {
    pub fn len(&self) -> usize {
        self.scans.len() + self.undecodable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 无法完整解码的扫描记录
#[derive(Debug, Clone)]
pub struct UndecodableScan {
    pub id: Uuid,
    pub frequency: Option<ScanFrequency>,
    pub time_of_day: Option<NaiveTime>,
    pub reason: String,
}

/// 扫描存储接口，引擎只更新状态与调度字段，从不创建或删除扫描
#[async_trait::async_trait]
pub trait ScanStore: Send + Sync {
    /// 已启用且 next_run <= now 的扫描，按 next_run 升序
    ///
    /// 单条记录解码失败不影响其他记录
    async fn fetch_due(&self, now: DateTime<Utc>) -> AppResult<DueScans>;

    async fn mark_processing(&self, id: Uuid) -> AppResult<()>;

    async fn record_success(
        &self,
        id: Uuid,
        outcome: &AnalysisOutcome,
        ran_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn record_error(
        &self,
        id: Uuid,
        message: &str,
        ran_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn record_skipped(&self, id: Uuid, next_run: DateTime<Utc>) -> AppResult<()>;
}

const SCAN_COLUMNS: &str = r#"
    id, owner_id, frequency, time_of_day, sources, drive_files,
    enabled, last_run, next_run, status, results
"#;

/// 基于 PostgreSQL 的扫描仓库
#[derive(Debug, Clone)]
pub struct ScanRepository {
    db: Database,
}

impl ScanRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn map_row(row: &PgRow) -> AppResult<ScheduledScan> {
        let drive_files: Json<Vec<DriveFileRef>> = row.try_get("drive_files")?;
        Ok(ScheduledScan {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            frequency: row.try_get("frequency")?,
            time_of_day: row.try_get("time_of_day")?,
            sources: row.try_get("sources")?,
            drive_files: drive_files.0,
            enabled: row.try_get("enabled")?,
            last_run: row.try_get("last_run")?,
            next_run: row.try_get("next_run")?,
            status: row.try_get("status")?,
            results: row.try_get("results")?,
        })
    }

    /// 逐行解码，坏记录不拖垮整个查询
    fn split_rows(rows: &[PgRow]) -> DueScans {
        let mut due = DueScans::default();
        for row in rows {
            let e = match Self::map_row(row) {
                Ok(scan) => {
                    due.scans.push(scan);
                    continue;
                }
                Err(e) => e,
            };

            match row.try_get::<Uuid, _>("id") {
                Ok(id) => {
                    error!(scan_id = %id, "扫描记录无法解码: {}", e);
                    due.undecodable.push(UndecodableScan {
                        id,
                        frequency: row.try_get("frequency").ok(),
                        time_of_day: row.try_get("time_of_day").ok(),
                        reason: format!("扫描记录无法解码: {}", e),
                    });
                }
                Err(id_err) => {
                    error!("扫描记录无法解码且ID无效，已忽略: {} ({})", e, id_err);
                }
            }
        }
        due
    }

    /// 执行单行更新，未命中时返回 NotFound
    async fn update_one(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, PgArguments>,
        id: Uuid,
    ) -> AppResult<()> {
        let result = query
            .execute(self.db.pool())
            .await
            .map_err(|e| AppError::service_unavailable(format!("更新扫描 {} 失败: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("扫描 {}", id)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScanStore for ScanRepository {
    async fn fetch_due(&self, now: DateTime<Utc>) -> AppResult<DueScans> {
        let query = format!(
            r#"
            SELECT {}
            FROM scheduled_scans
            WHERE enabled = TRUE
              AND next_run <= $1
            ORDER BY next_run ASC
            "#,
            SCAN_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| AppError::service_unavailable(format!("查询到期扫描失败: {}", e)))?;

        Ok(Self::split_rows(&rows))
    }

    async fn mark_processing(&self, id: Uuid) -> AppResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE scheduled_scans
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id);

        self.update_one(query, id).await
    }

    async fn record_success(
        &self,
        id: Uuid,
        outcome: &AnalysisOutcome,
        ran_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> AppResult<()> {
        let results = ScanResults::Outcome(outcome.clone()).to_json();
        let query = sqlx::query(
            r#"
            UPDATE scheduled_scans
            SET status = 'completed', results = $2, last_run = $3, next_run = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(results)
        .bind(ran_at)
        .bind(next_run);

        self.update_one(query, id).await
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
        let query = sqlx::query(
            r#"
            UPDATE scheduled_scans
            SET status = 'error', results = $2, last_run = $3, next_run = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(results)
        .bind(ran_at)
        .bind(next_run);

        self.update_one(query, id).await
    }

    async fn record_skipped(&self, id: Uuid, next_run: DateTime<Utc>) -> AppResult<()> {
        let results = ScanResults::Skipped {
            reason: "未配置数据源或云盘文件".to_string(),
        }
        .to_json();
        let query = sqlx::query(
            r#"
            UPDATE scheduled_scans
            SET status = 'skipped', results = $2, next_run = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(results)
        .bind(next_run);

        self.update_one(query, id).await
    }
}
