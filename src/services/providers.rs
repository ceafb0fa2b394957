use crate::{
    error::{AppError, AppResult},
    models::AnalysisOutcome,
};

/// 外部准确性分析服务
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    /// 分析合并后的内容
    async fn analyze(&self, text: &str) -> AppResult<AnalysisOutcome>;
}

/// 云盘文件下载
#[async_trait::async_trait]
pub trait FileSourceProvider: Send + Sync {
    /// 下载文件并返回文本内容
    async fn fetch_drive_file(&self, file_id: &str) -> AppResult<String>;
}

/// 命名数据源
#[async_trait::async_trait]
pub trait NamedSourceProvider: Send + Sync {
    async fn fetch_source(&self, source_id: &str) -> AppResult<String>;
}

/// 读取HTTP响应正文，非 2xx 转换为携带状态码的远程错误
pub(crate) async fn read_text_response(resp: reqwest::Response, what: &str) -> AppResult<String> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| AppError::remote(None, format!("读取{}响应失败: {}", what, e)))?;

    if !status.is_success() {
        return Err(AppError::remote(
            Some(status.as_u16()),
            format!(
                "{}失败: body_preview={}",
                what,
                text.chars().take(200).collect::<String>()
            ),
        ));
    }
    Ok(text)
}

/// 传输层错误（连接失败、超时）不携带状态码
pub(crate) fn transport_error(what: &str, err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() {
        "请求超时"
    } else {
        "请求发送失败"
    };
    AppError::remote(None, format!("{}{}: {}", what, kind, err))
}
