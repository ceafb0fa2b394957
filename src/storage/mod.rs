pub mod minio;

pub use minio::MinioStorage;

use crate::error::AppResult;

/// 存储抽象接口
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// 下载文件，对象不存在时返回 NotFound
    async fn download(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>>;
}
