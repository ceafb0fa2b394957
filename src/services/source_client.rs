use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::{
    config::SourceConfig,
    error::{AppError, AppResult},
    services::providers::{NamedSourceProvider, read_text_response, transport_error},
};

/// 命名数据源服务客户端
#[derive(Debug, Clone)]
pub struct SourceClient {
    http: Client,
    config: SourceConfig,
}

impl SourceClient {
    pub fn new(config: SourceConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("创建HTTP客户端失败: {}", e)))?;
        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl NamedSourceProvider for SourceClient {
    async fn fetch_source(&self, source_id: &str) -> AppResult<String> {
        let source_id = source_id.trim();
        if source_id.is_empty() || source_id.contains('/') {
            return Err(AppError::bad_request(format!(
                "无效的数据源ID: '{}'",
                source_id
            )));
        }

        let url = self
            .config
            .get_api_url(&format!("/sources/{}/content", source_id));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("数据源读取", e))?;
        let text = read_text_response(resp, "数据源读取").await?;

        debug!(source_id, len = text.len(), "数据源读取完成");
        Ok(text)
    }
}
