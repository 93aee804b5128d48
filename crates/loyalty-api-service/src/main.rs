//! 会员积分 HTTP 服务入口

use axum::http::HeaderValue;
use loyalty_api::{AppState, build_router};
use loyalty_management::ServiceContainer;
use loyalty_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "loyalty-api-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, load_error) = match AppConfig::load(SERVICE_NAME) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    let _guard = observability::init(&config.observability, SERVICE_NAME).await?;
    if let Some(e) = load_error {
        warn!(error = %e, "配置加载失败，使用默认配置");
    }

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    if config.is_production() && config.auth.jwt_secret == default_jwt_secret() {
        anyhow::bail!("生产环境必须通过 LOYALTY_AUTH__JWT_SECRET 设置 JWT 密钥");
    }

    let services = ServiceContainer::from_config(&config).await?;

    // 过期扫描与 HTTP 服务共用同一个关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = services.expire_worker(&config);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let state = AppState::from_config(services.clone(), &config);
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(cors_layer())
            .layer(CompressionLayer::new()),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "过期扫描任务异常退出");
    }
    if let Some(db) = services.database() {
        db.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

fn default_jwt_secret() -> String {
    loyalty_shared::config::AuthConfig::default().jwt_secret
}

/// CORS 配置：通过 LOYALTY_CORS_ORIGINS 环境变量控制允许的来源
fn cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("LOYALTY_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if allowed_origins == "*" {
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
