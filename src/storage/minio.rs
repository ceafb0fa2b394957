use super::Storage;
use crate::{
    config::MinioConfig,
    error::{AppError, AppResult},
};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, config::Credentials};
use std::sync::Arc;

/// MinIO存储实现
#[derive(Debug, Clone)]
pub struct MinioStorage {
    client: Arc<Client>,
    bucket: String,
}

impl MinioStorage {
    /// 创建新的MinIO存储实例
    pub async fn new(config: MinioConfig) -> AppResult<Self> {
        // 创建自定义凭证
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,    // session token
            None,    // expiration
            "minio", // provider name
        );

        // 构建S3配置
        let s3_config = aws_sdk_s3::Config::builder()
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .region(Region::new("us-east-1")) // MinIO默认区域
            .force_path_style(true) // MinIO需要路径样式
            .behavior_version(BehaviorVersion::latest())
            .build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket,
        })
    }

    /// 云盘文件所在的 bucket
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// 健康检查
    pub async fn health_check(&self) -> AppResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::error!("MinIO健康检查失败: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait::async_trait]
impl Storage for MinioStorage {
    async fn download(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    AppError::not_found(format!("{}/{}", bucket, key))
                } else {
                    AppError::Storage(format!("下载文件失败: {}", service_err))
                }
            })?;

        let data = result
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("读取文件数据失败: {}", e)))?;

        Ok(data.to_vec())
    }
}
