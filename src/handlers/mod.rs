pub mod sweep;
pub mod system;

use std::sync::Arc;

use crate::{
    config::Config,
    database::Database,
    services::{BoundedDispatcher, ScanOrchestrator},
    storage::MinioStorage,
};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub database: Option<Database>,
    pub storage: Option<MinioStorage>,
    /// 数据库不可用时为空，此时不能执行扫描轮次
    pub orchestrator: Option<ScanOrchestrator>,
    pub dispatcher: Arc<BoundedDispatcher>,
    pub config: Config,
}

pub use sweep::{DispatcherStatus, dispatcher_status, run_sweep};
pub use system::{db_health_check, health_check, storage_health_check, system_status};
