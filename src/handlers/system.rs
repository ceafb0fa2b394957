use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    handlers::AppState,
    response::{ApiResponse, ResponseCode},
};

#[derive(Deserialize)]
pub struct HealthQuery {
    #[serde(default)]
    detail: bool,
}

/// 健康检查处理器
pub async fn health_check(
    Query(params): Query<HealthQuery>,
) -> Json<ApiResponse<serde_json::Value>> {
    if params.detail {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut details = HashMap::new();
        details.insert("status", "healthy");
        details.insert("version", env!("CARGO_PKG_VERSION"));
        details.insert("timestamp", timestamp.as_str());

        Json(ApiResponse::success(serde_json::json!(details)))
    } else {
        Json(ApiResponse::success(serde_json::json!({"status": "ok"})))
    }
}

/// 数据库健康检查处理器
pub async fn db_health_check(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<serde_json::Value>> {
    match &app_state.database {
        Some(db) => match db.health_check().await {
            Ok(true) => {
                let timestamp = chrono::Utc::now().to_rfc3339();
                let mut details = HashMap::new();
                details.insert("database", "healthy");
                details.insert("timestamp", timestamp.as_str());
                Json(ApiResponse::success(serde_json::json!(details)))
            }
            Ok(false) => Json(ApiResponse::error_with_data(
                ResponseCode::SERVICE_UNAVAILABLE,
                "数据库连接异常".to_string(),
                serde_json::json!({"status": "unhealthy"}),
            )),
            Err(e) => {
                tracing::error!("数据库健康检查失败: {}", e);
                Json(ApiResponse::error_with_data(
                    ResponseCode::SERVICE_UNAVAILABLE,
                    format!("数据库健康检查失败: {}", e),
                    serde_json::json!({"status": "error"}),
                ))
            }
        },
        None => Json(ApiResponse::error_with_data(
            ResponseCode::SERVICE_UNAVAILABLE,
            "数据库未配置或连接失败".to_string(),
            serde_json::json!({"status": "unavailable"}),
        )),
    }
}

/// 存储健康检查处理器
pub async fn storage_health_check(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<serde_json::Value>> {
    match &app_state.storage {
        Some(storage) => match storage.health_check().await {
            Ok(true) => Json(ApiResponse::success(serde_json::json!({
                "storage": "healthy",
                "bucket": storage.bucket(),
            }))),
            Ok(false) | Err(_) => Json(ApiResponse::error_with_data(
                ResponseCode::SERVICE_UNAVAILABLE,
                "存储服务连接异常".to_string(),
                serde_json::json!({"status": "unhealthy"}),
            )),
        },
        None => Json(ApiResponse::error_with_data(
            ResponseCode::SERVICE_UNAVAILABLE,
            "存储服务未配置或连接失败".to_string(),
            serde_json::json!({"status": "unavailable"}),
        )),
    }
}

/// 系统状态检查
pub async fn system_status(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<serde_json::Value>> {
    let availability = |present: bool| if present { "available" } else { "unavailable" };

    let mut status = HashMap::new();
    status.insert("database", availability(app_state.database.is_some()));
    status.insert("storage", availability(app_state.storage.is_some()));
    status.insert(
        "orchestrator",
        availability(app_state.orchestrator.is_some()),
    );
    status.insert(
        "sweep_trigger",
        if app_state.config.sweep.trigger_enabled {
            "enabled"
        } else {
            "disabled"
        },
    );

    Json(ApiResponse::success(serde_json::json!(status)))
}
