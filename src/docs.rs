use crate::{
    handlers::sweep::DispatcherStatus,
    models::{
        AnalysisOutcome, DriveFileRef, ExecutionStats, RiskLevel, ScanFrequency, ScanStatus,
        ScheduledScan,
    },
    response::ApiResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // 扫描执行API
        crate::handlers::sweep::run_sweep,
        crate::handlers::sweep::dispatcher_status,
    ),
    components(
        schemas(
            // 扫描相关模型
            ScheduledScan,
            ScanFrequency,
            ScanStatus,
            DriveFileRef,
            AnalysisOutcome,
            RiskLevel,
            ExecutionStats,
            DispatcherStatus,
            // 通用响应模型
            ApiResponse<ExecutionStats>,
            ApiResponse<DispatcherStatus>,
            ApiResponse<String>,
        )
    ),
    tags(
        (name = "扫描执行", description = "定时扫描轮次的触发与调度器状态"),
        (name = "系统监控", description = "系统健康状态和统计信息")
    ),
    info(
        title = "ScanWatch API",
        version = "1.0.0",
        description = "ScanWatch 定时扫描执行引擎 REST API 文档",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "开发环境")
    )
)]
pub struct ApiDoc;
