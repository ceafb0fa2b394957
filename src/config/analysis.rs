use serde::{Deserialize, Serialize};

/// 准确性分析服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 分析服务 API 基础URL
    pub base_url: String,
    /// 访问令牌（可选，作为 Bearer 发送）
    pub api_key: Option<String>,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 重试耗尽后是否以合成结果代替错误（结果会被标记为 synthetic）
    #[serde(default)]
    pub fallback_on_exhaustion: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:18080/api".to_string(),
            api_key: None,
            timeout_secs: 60,
            fallback_on_exhaustion: false,
        }
    }
}

impl AnalysisConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        validate_base_url("analysis", &self.base_url)?;

        if self.timeout_secs == 0 {
            return Err("分析请求超时必须大于0".to_string());
        }

        Ok(())
    }

    /// 获取完整的API URL
    pub fn get_api_url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }
}

/// 命名数据源服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 数据源服务 API 基础URL
    pub base_url: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:18081/api".to_string(),
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        validate_base_url("sources", &self.base_url)?;

        if self.timeout_secs == 0 {
            return Err("数据源请求超时必须大于0".to_string());
        }

        Ok(())
    }

    /// 获取完整的API URL
    pub fn get_api_url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }
}

fn validate_base_url(section: &str, base_url: &str) -> Result<(), String> {
    if base_url.is_empty() {
        return Err(format!("{} base_url 不能为空", section));
    }

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(format!(
            "{} base_url 必须以 http:// 或 https:// 开头",
            section
        ));
    }

    Ok(())
}

fn join_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", base, endpoint)
}
