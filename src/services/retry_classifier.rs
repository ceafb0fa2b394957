use crate::error::AppError;

/// 远程调用失败的重试分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// 请求错误、鉴权失败、资源不存在：重试无意义
    Fatal,
    /// 超时、5xx、传输层错误
    Retryable,
}

/// 不可重试的HTTP状态码
const FATAL_STATUSES: [u16; 4] = [400, 401, 403, 404];

/// 根据错误携带的状态码分类，纯函数
pub fn classify(error: &AppError) -> RetryClass {
    match error.http_status() {
        Some(status) if FATAL_STATUSES.contains(&status) => RetryClass::Fatal,
        _ => RetryClass::Retryable,
    }
}
