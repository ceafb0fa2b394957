use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    config::AnalysisConfig,
    error::{AppError, AppResult},
    models::AnalysisOutcome,
    services::providers::{AnalysisService, read_text_response, transport_error},
};

/// 准确性分析服务客户端
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: Client,
    config: AnalysisConfig,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

impl AnalysisClient {
    pub fn new(config: AnalysisConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("创建HTTP客户端失败: {}", e)))?;
        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl AnalysisService for AnalysisClient {
    async fn analyze(&self, text: &str) -> AppResult<AnalysisOutcome> {
        if text.trim().is_empty() {
            return Err(AppError::bad_request("分析内容为空"));
        }

        let url = self.config.get_api_url("/analyze");
        let started = Instant::now();

        let mut request = self.http.post(&url).json(&AnalyzeRequest { text });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| transport_error("准确性分析", e))?;
        let body = read_text_response(resp, "准确性分析").await?;

        let mut outcome: AnalysisOutcome = serde_json::from_str(&body)
            .map_err(|e| AppError::remote(None, format!("解析分析结果失败: {}", e)))?;
        outcome.validate()?;
        outcome.synthetic = false;
        if outcome.processing_time_ms == 0 {
            outcome.processing_time_ms = started.elapsed().as_millis() as u64;
        }

        debug!(
            accuracy = outcome.accuracy,
            hallucinations = outcome.hallucination_count,
            len = text.len(),
            "准确性分析完成"
        );
        Ok(outcome)
    }
}
