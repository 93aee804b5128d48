//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;
use std::time::Duration;

use loyalty_management::ServiceContainer;
use loyalty_shared::config::AppConfig;

use crate::auth::{JwtConfig, JwtManager};

/// 请求截止时间的默认值
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub services: ServiceContainer,
    pub jwt: Arc<JwtManager>,
    /// 写操作的截止时间，超时返回 OUTCOME_UNKNOWN
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(services: ServiceContainer, jwt: JwtManager, request_timeout: Duration) -> Self {
        Self {
            services,
            jwt: Arc::new(jwt),
            request_timeout,
        }
    }

    /// 按配置创建
    pub fn from_config(services: ServiceContainer, config: &AppConfig) -> Self {
        let timeout = if config.server.request_timeout_ms == 0 {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            config.server.request_timeout()
        };
        Self::new(
            services,
            JwtManager::new(JwtConfig::from(&config.auth)),
            timeout,
        )
    }
}
