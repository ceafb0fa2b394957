/*
 * ScanWatch - Scheduled Accuracy Scan Engine
 * Copyright (c) 2024 ScanWatch Project
 *
 * This work is licensed under CC BY-NC-SA 4.0
 * https://creativecommons.org/licenses/by-nc-sa/4.0/
 */

use axum::{
    Router,
    http::Method,
    response::{Html, Json},
    routing::get,
};
use scanwatch_backend::{
    config::Config,
    database::Database,
    docs::ApiDoc,
    error::AppResult,
    handlers::AppState,
    repositories::ScanRepository,
    routes::create_api_routes,
    services::{
        AnalysisClient, BoundedDispatcher, ContentAggregator, ObjectStorageDriveProvider,
        ScanOrchestrator, SourceClient, SweepPoller, SweepSettings,
    },
    storage::MinioStorage,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

/// Swagger UI 页面（OpenAPI JSON 路径：/api-docs/openapi.json）
async fn swagger_ui_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset=UTF-8>
  <title>ScanWatch API 文档</title>
  <link rel=stylesheet href=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui.css>
</head>
<body>
  <div id=swagger-ui></div>
  <script src=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui-bundle.js></script>
  <script>
    window.onload = function() {
      window.ui = SwaggerUIBundle({
        url: '/api-docs/openapi.json',
        dom_id: '#swagger-ui',
        deepLinking: true
      });
    };
  </script>
</body>
</html>"#,
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听退出信号失败: {}", e);
    }
    tracing::info!("收到退出信号，正在关闭服务...");
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanwatch_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = match Config::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("已加载配置文件: config.toml");
            config
        }
        Err(e) => {
            tracing::warn!("加载配置文件失败（{}），使用默认配置", e);
            let default_config = Config::default();
            // 保存默认配置到文件
            if let Err(e) = default_config.save_to_file("config.toml") {
                tracing::warn!("保存默认配置失败: {}", e);
            }
            default_config
        }
    };

    tracing::info!("服务器配置: {}", config.server_addr());

    // 初始化数据库（如果连接失败则继续启动，但记录警告）
    let database = match Database::new(&config.database).await {
        Ok(db) => {
            if let Err(e) = db.verify_schema().await {
                tracing::warn!("数据库验证失败: {}", e);
            }
            Some(db)
        }
        Err(e) => {
            tracing::warn!("数据库连接失败，服务将在无数据库模式下启动: {}", e);
            None
        }
    };

    // 初始化MinIO存储（云盘文件来源）
    let storage = match MinioStorage::new(config.minio.clone()).await {
        Ok(storage) => Some(storage),
        Err(e) => {
            tracing::warn!("MinIO存储连接失败，云盘文件将不可用: {}", e);
            None
        }
    };

    // 全进程唯一的远程调用调度器
    let dispatcher = Arc::new(BoundedDispatcher::new(config.dispatcher.clone()));
    tracing::info!(
        "远程调用调度器: 最大并发={}, 最大尝试次数={}",
        config.dispatcher.max_concurrent,
        config.dispatcher.max_attempts
    );

    let orchestrator = match (&database, &storage) {
        (Some(db), Some(storage)) => {
            let drive = ObjectStorageDriveProvider::new(
                Arc::new(storage.clone()),
                storage.bucket().to_string(),
            );
            let aggregator = ContentAggregator::new(
                Arc::new(drive),
                Arc::new(SourceClient::new(config.sources.clone())?),
                dispatcher.clone(),
            );
            let orchestrator = ScanOrchestrator::new(
                Arc::new(ScanRepository::new(db.clone())),
                aggregator,
                dispatcher.clone(),
                Arc::new(AnalysisClient::new(config.analysis.clone())?),
                SweepSettings::from_config(&config.sweep, &config.analysis),
            );
            tracing::info!("扫描编排器初始化成功");
            Some(orchestrator)
        }
        _ => {
            tracing::warn!("扫描编排器初始化跳过：缺少必要的依赖（数据库/存储）");
            None
        }
    };

    // 进程内定时触发（默认关闭，由外部调度器调用 /api/sweeps/run）
    if let Some(orchestrator) = &orchestrator {
        if config.sweep.trigger_enabled {
            let poller =
                SweepPoller::new(orchestrator.clone(), config.sweep.trigger_interval_secs);
            tokio::spawn(async move {
                poller.start().await;
            });
        }
    }

    let app_state = AppState {
        database: database.clone(),
        storage,
        orchestrator,
        dispatcher,
        config: config.clone(),
    };

    // 创建CORS中间件
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        // OpenAPI JSON 路由
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/swagger-ui", get(swagger_ui_page))
        // 业务API路由
        .merge(create_api_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("🚀 服务器启动成功，监听地址: {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}
