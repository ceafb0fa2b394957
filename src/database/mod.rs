use crate::{config::DatabaseConfig, error::AppResult};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

/// 数据库连接池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool", &"<PgPool>")
            .finish()
    }
}

impl Database {
    /// 创建数据库连接池
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        tracing::info!("正在连接数据库: {}", mask_database_url(&config.url));

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await?;

        tracing::info!("数据库连接成功，最大连接数: {}", config.max_connections);

        Ok(Self { pool })
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 检查扫描表是否存在（表结构由 sql/ 下的脚本管理）
    pub async fn verify_schema(&self) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'scheduled_scans')",
        )
        .fetch_one(&self.pool)
        .await?;

        if exists {
            tracing::info!("数据库表结构验证完成");
        } else {
            tracing::warn!("未找到 scheduled_scans 表，请先执行 sql/scheduled_scans.sql");
        }
        Ok(exists)
    }

    /// 检查数据库健康状态
    pub async fn health_check(&self) -> AppResult<bool> {
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == 1)
    }

    /// 关闭数据库连接池
    pub async fn close(&self) {
        tracing::info!("正在关闭数据库连接池...");
        self.pool.close().await;
        tracing::info!("数据库连接池已关闭");
    }
}

/// 隐藏数据库URL中的敏感信息
fn mask_database_url(url: &str) -> String {
    let Some(at_pos) = url.rfind('@') else {
        return url.to_string();
    };
    let Some(protocol_end) = url.find("://") else {
        return url.to_string();
    };
    if protocol_end + 3 > at_pos {
        return url.to_string();
    }

    let auth_part = &url[protocol_end + 3..at_pos];
    match auth_part.find(':') {
        Some(colon_pos) => {
            let mut masked = url.to_string();
            masked.replace_range(protocol_end + 3 + colon_pos + 1..at_pos, "***");
            masked
        }
        None => url.to_string(),
    }
}
