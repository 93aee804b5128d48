//! PostgreSQL 连接池
//!
//! 进程启动时数据库可能还没就绪，`connect` 对瞬时故障按退避重试；
//! 就绪探针使用带时限的 `health_check`。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::{InfraError, Result};
use crate::retry::{RetryPolicy, retry_with_policy};

/// 健康检查时限，超过即视为不可用
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// 连接池句柄，克隆共享同一个池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 建立连接池，瞬时故障最多重试 5 次
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            ..RetryPolicy::default()
        };
        Self::connect_with_policy(config, &policy).await
    }

    pub async fn connect_with_policy(config: &DatabaseConfig, policy: &RetryPolicy) -> Result<Self> {
        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        let pool = retry_with_policy(policy, "connect_database", InfraError::is_retryable, || {
            let options = options.clone();
            async move {
                options
                    .connect(&config.url)
                    .await
                    .map_err(InfraError::from)
            }
        })
        .await?;

        info!("数据库连接池已建立");
        Ok(Self { pool })
    }

    /// 包装已有连接池（测试中复用 sqlx 的连接）
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行一次 `SELECT 1`，超时按内部错误返回
    pub async fn health_check(&self) -> Result<()> {
        let ping = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, ping).await {
            Ok(result) => result.map(|_| ()).map_err(InfraError::from),
            Err(_) => Err(InfraError::Internal(format!(
                "数据库健康检查超过 {}ms",
                HEALTH_CHECK_TIMEOUT.as_millis()
            ))),
        }
    }

    /// 等待在途查询结束后关闭
    pub async fn close(&self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }

    /// 执行仓库根目录 migrations/ 下的迁移
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("数据库迁移已完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_fails_fast_on_bad_url() {
        let config = DatabaseConfig {
            url: "not-a-postgres-url".into(),
            ..Default::default()
        };
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert!(Database::connect_with_policy(&config, &policy).await.is_err());
    }

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_database_connection() {
        let config = DatabaseConfig {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url),
            ..Default::default()
        };
        let db = Database::connect(&config).await.unwrap();
        db.health_check().await.unwrap();
        db.run_migrations().await.unwrap();
    }
}
