// 服务层模块
pub mod content_aggregator;
pub mod dispatcher;
pub mod providers;
pub mod retry_classifier;
pub mod run_scheduler;
pub mod scan_orchestrator;
pub mod sweep_poller;

// 外部协作方的实现
pub mod analysis_client;
pub mod drive_provider;
pub mod source_client;

pub use analysis_client::AnalysisClient;
pub use content_aggregator::ContentAggregator;
pub use dispatcher::{BoundedDispatcher, DispatchError};
pub use drive_provider::ObjectStorageDriveProvider;
pub use providers::{AnalysisService, FileSourceProvider, NamedSourceProvider};
pub use retry_classifier::{RetryClass, classify};
pub use run_scheduler::next_run;
pub use scan_orchestrator::{ScanOrchestrator, SweepSettings};
pub use source_client::SourceClient;
pub use sweep_poller::SweepPoller;
