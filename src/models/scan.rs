use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::AnalysisOutcome;

/// 扫描执行频率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scan_frequency_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

/// 扫描状态：反映最近一次执行的结果，而不是是否还有待执行的工作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scan_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// 尚未执行
    Idle,
    /// 执行中
    Processing,
    /// 已完成
    Completed,
    /// 失败
    Error,
    /// 未配置任何数据源，本轮跳过
    Skipped,
}

/// 云盘文件引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DriveFileRef {
    pub file_id: String,
    pub file_name: String,
}

/// 定时扫描
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduledScan {
    pub id: Uuid,
    /// 发起者ID
    pub owner_id: String,
    pub frequency: ScanFrequency,
    /// 每天的执行时刻（UTC），hourly 频率下仅作为种子
    #[schema(value_type = String, example = "09:00:00")]
    pub time_of_day: NaiveTime,
    /// 命名数据源ID（有序）
    pub sources: Vec<String>,
    pub drive_files: Vec<DriveFileRef>,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    /// 唯一的选取依据
    pub next_run: DateTime<Utc>,
    pub status: ScanStatus,
    /// 最近一次的结构化结果或错误信息，见 [`ScanResults`]
    pub results: Option<JsonValue>,
}

impl ScheduledScan {
    /// 声明的数据源与云盘文件总数
    pub fn input_count(&self) -> usize {
        self.sources.len() + self.drive_files.len()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run <= now
    }
}

/// 持久化到 `results` 列的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScanResults {
    Outcome(AnalysisOutcome),
    Error { message: String },
    Skipped { reason: String },
}

impl ScanResults {
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}
