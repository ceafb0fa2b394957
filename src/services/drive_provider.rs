use crate::{
    error::{AppError, AppResult},
    services::providers::FileSourceProvider,
    storage::Storage,
};
use std::sync::Arc;
use tracing::debug;

/// 以对象存储为后端的云盘文件读取，对象 key 即 fileId
#[derive(Clone)]
pub struct ObjectStorageDriveProvider {
    storage: Arc<dyn Storage>,
    bucket: String,
}

impl ObjectStorageDriveProvider {
    pub fn new(storage: Arc<dyn Storage>, bucket: String) -> Self {
        Self { storage, bucket }
    }
}

#[async_trait::async_trait]
impl FileSourceProvider for ObjectStorageDriveProvider {
    async fn fetch_drive_file(&self, file_id: &str) -> AppResult<String> {
        if file_id.trim().is_empty() {
            return Err(AppError::bad_request("云盘文件ID为空"));
        }

        let data = self.storage.download(&self.bucket, file_id).await?;
        debug!(file_id, size = data.len(), "云盘文件下载完成");

        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}
