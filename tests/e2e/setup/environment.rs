//! 测试环境管理
//!
//! 每个测试独占一个服务实例，互不干扰。

use std::time::Duration;

use anyhow::Result;
use loyalty_api::auth::{JwtConfig, JwtManager, Principal};
use loyalty_api::{AppState, build_router};
use loyalty_management::ServiceContainer;
use loyalty_management::repository::memory::MemoryDirectory;
use loyalty_shared::config::AppConfig;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::helpers::ApiClient;

pub const BUSINESS: i64 = 100;
pub const OTHER_BUSINESS: i64 = 200;
pub const PROGRAM: i64 = 10;
pub const SECOND_PROGRAM: i64 = 11;
pub const CUSTOMER: i64 = 1;
pub const OTHER_CUSTOMER: i64 = 2;

/// 运行中的测试服务
pub struct TestEnvironment {
    pub base_url: String,
    pub ws_url: String,
    jwt: JwtManager,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
}

impl TestEnvironment {
    /// 绑定随机端口并启动服务
    pub async fn setup() -> Result<Self> {
        let directory = MemoryDirectory::new()
            .with_program(PROGRAM, BUSINESS, "咖啡集点")
            .with_program(SECOND_PROGRAM, BUSINESS, "甜品会员")
            .with_program(20, OTHER_BUSINESS, "书店会员")
            .with_customer(CUSTOMER, "小王")
            .with_customer(OTHER_CUSTOMER, "小李");
        let services = ServiceContainer::in_memory_with(directory, &AppConfig::default());
        let jwt = JwtManager::new(JwtConfig::default());
        let state = AppState::new(services, jwt.clone(), Duration::from_secs(5));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let app = build_router(state);
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/ws"),
            jwt,
            shutdown,
            server,
        })
    }

    pub fn token(&self, principal: Principal) -> String {
        self.jwt.generate_token(principal).unwrap().0
    }

    /// 以商户身份访问的客户端
    pub fn business(&self, business_id: i64) -> ApiClient {
        ApiClient::new(&self.base_url, self.token(Principal::business(business_id)))
    }

    /// 以顾客身份访问的客户端
    pub fn customer(&self, customer_id: i64) -> ApiClient {
        ApiClient::new(&self.base_url, self.token(Principal::customer(customer_id)))
    }

    pub async fn teardown(self) {
        let _ = self.shutdown.send(true);
        // 长连接可能拖住优雅关闭，超时后直接放弃
        let _ = tokio::time::timeout(Duration::from_secs(2), self.server).await;
    }
}
