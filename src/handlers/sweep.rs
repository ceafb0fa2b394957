use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppError, handlers::AppState, models::ExecutionStats, response::ApiResponse};

/// 调度器槽位使用情况
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatcherStatus {
    /// 最大并发槽位
    pub max_concurrent: usize,
    /// 占用中的槽位
    pub in_flight: usize,
    /// 空闲槽位
    pub available: usize,
}

/// 执行一个扫描轮次
///
/// 处理所有到期的定时扫描，返回本轮执行统计。同一时刻只会有一个轮次在执行，
/// 并发的触发请求会排队等待。
#[utoipa::path(
    post,
    path = "/api/sweeps/run",
    responses(
        (status = 200, description = "扫描轮次执行完成", body = ApiResponse<ExecutionStats>),
        (status = 500, description = "服务器内部错误", body = ApiResponse<String>)
    ),
    tag = "扫描执行"
)]
pub async fn run_sweep(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<ExecutionStats>>, AppError> {
    let orchestrator = app_state
        .orchestrator
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("扫描编排器不可用（数据库未连接）"))?;

    let stats = orchestrator.run_sweep().await?;
    let message = format!(
        "扫描轮次完成：成功 {}，失败 {}，跳过 {}",
        stats.succeeded, stats.errored, stats.skipped
    );
    Ok(Json(ApiResponse::success_with_message(stats, message)))
}

/// 查询调度器状态
#[utoipa::path(
    get,
    path = "/api/dispatcher/status",
    responses(
        (status = 200, description = "成功获取调度器状态", body = ApiResponse<DispatcherStatus>)
    ),
    tag = "扫描执行"
)]
pub async fn dispatcher_status(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<DispatcherStatus>> {
    let dispatcher = &app_state.dispatcher;
    let max_concurrent = dispatcher.max_concurrent();
    let in_flight = dispatcher.in_flight();

    Json(ApiResponse::success(DispatcherStatus {
        max_concurrent,
        in_flight,
        available: max_concurrent.saturating_sub(in_flight),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Config, DispatcherConfig},
        models::{ScanFrequency, ScanStatus},
        response::ResponseCode,
        routes::create_api_routes,
        services::{BoundedDispatcher, ContentAggregator, ScanOrchestrator, SweepSettings},
        testing::{MemoryScanStore, ScriptedAnalysis, ScriptedSources, scan, spawn_stub},
    };
    use std::{sync::Arc, time::Duration};

    fn state(store: Option<Arc<MemoryScanStore>>) -> AppState {
        let dispatcher = Arc::new(BoundedDispatcher::new(DispatcherConfig {
            max_concurrent: 4,
            ..Default::default()
        }));
        let orchestrator = store.map(|store| {
            let sources = Arc::new(ScriptedSources::default());
            ScanOrchestrator::new(
                store,
                ContentAggregator::new(sources.clone(), sources, dispatcher.clone()),
                dispatcher.clone(),
                Arc::new(ScriptedAnalysis::succeeding()),
                SweepSettings {
                    batch_size: 10,
                    inter_batch_delay: Duration::ZERO,
                    deadline: None,
                    fallback_on_exhaustion: false,
                },
            )
        });
        AppState {
            database: None,
            storage: None,
            orchestrator,
            dispatcher,
            config: Config::default(),
        }
    }

    #[tokio::test]
    async fn test_run_sweep_endpoint() {
        let due = scan(ScanFrequency::Daily, &["news"], &[]);
        let empty = scan(ScanFrequency::Hourly, &[], &[]);
        let id = due.id;
        let store = Arc::new(MemoryScanStore::with_scans(vec![due, empty]));

        let app = create_api_routes().with_state(state(Some(store.clone())));
        let base_url = spawn_stub(app).await;
        let body: ApiResponse<ExecutionStats> = reqwest::Client::new()
            .post(format!("{}/api/sweeps/run", base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body.code, ResponseCode::SUCCESS);
        let stats = body.data.unwrap();
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.get(id).status, ScanStatus::Completed);
    }

    #[tokio::test]
    async fn test_run_sweep_without_orchestrator() {
        let base_url = spawn_stub(create_api_routes().with_state(state(None))).await;
        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("{}/api/sweeps/run", base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["code"], ResponseCode::INTERNAL_ERROR);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_dispatcher_status_endpoint() {
        let base_url = spawn_stub(create_api_routes().with_state(state(None))).await;
        let body: ApiResponse<DispatcherStatus> =
            reqwest::get(format!("{}/api/dispatcher/status", base_url))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

        let status = body.data.unwrap();
        assert_eq!(status.max_concurrent, 4);
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.available, 4);
    }
}
