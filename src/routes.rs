use crate::handlers::{
    AppState, db_health_check, dispatcher_status, health_check, run_sweep, storage_health_check,
    system_status,
};
use axum::{
    Router,
    routing::{get, post},
};

/// 创建API路由
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        // 健康检查和系统状态
        .route("/health", get(health_check))
        .route("/api/status", get(system_status))
        .route("/api/health/db", get(db_health_check))
        .route("/api/health/storage", get(storage_health_check))
        // 扫描执行API
        .route("/api/sweeps/run", post(run_sweep)) // 执行一个扫描轮次
        .route("/api/dispatcher/status", get(dispatcher_status)) // 调度器槽位状态
}
