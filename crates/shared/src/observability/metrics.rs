//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig, service_name: &str) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述，会出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("points_awards_total", "Total number of point awards");
    metrics::describe_histogram!(
        "points_award_duration_seconds",
        "Point award duration in seconds"
    );
    metrics::describe_counter!(
        "ledger_transactions_total",
        "Total number of ledger transactions applied"
    );

    metrics::describe_counter!(
        "approval_resolutions_total",
        "Total number of approval request resolutions"
    );
    metrics::describe_counter!(
        "approvals_expired_total",
        "Total number of approval requests expired by the sweeper"
    );

    metrics::describe_counter!(
        "fanout_events_total",
        "Total number of real-time events emitted"
    );
    metrics::describe_counter!(
        "fanout_events_dropped_total",
        "Real-time events dropped because a session queue was full"
    );
    metrics::describe_gauge!("realtime_sessions", "Currently connected real-time sessions");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录积分发放，outcome 取 applied / replayed / rejected
#[inline]
pub fn record_points_award(source: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "points_awards_total",
        "source" => source.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "points_award_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// 记录账本流水
#[inline]
pub fn record_ledger_transaction(kind: &str, replayed: bool) {
    metrics::counter!(
        "ledger_transactions_total",
        "kind" => kind.to_string(),
        "replayed" => replayed.to_string()
    )
    .increment(1);
}

/// 记录审批结果
#[inline]
pub fn record_approval_resolution(request_type: &str, outcome: &str) {
    metrics::counter!(
        "approval_resolutions_total",
        "request_type" => request_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录过期扫描结果
#[inline]
pub fn record_approvals_expired(count: u64) {
    metrics::counter!("approvals_expired_total").increment(count);
}

/// 记录实时事件
#[inline]
pub fn record_fanout_event(event_type: &str, delivered: usize) {
    metrics::counter!(
        "fanout_events_total",
        "event_type" => event_type.to_string(),
        "delivered" => (delivered > 0).to_string()
    )
    .increment(1);
}

/// 记录因队列满被丢弃的实时事件
#[inline]
pub fn record_fanout_dropped(event_type: &str) {
    metrics::counter!(
        "fanout_events_dropped_total",
        "event_type" => event_type.to_string()
    )
    .increment(1);
}

/// 更新在线会话数
#[inline]
pub fn set_realtime_sessions(count: f64) {
    metrics::gauge!("realtime_sessions").set(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未安装 recorder 时记录是空操作
        record_http_request("GET", "/api/cards", 200, 0.1);
        record_points_award("BUSINESS", "applied", 0.2);
        record_ledger_transaction("CREDIT", false);
        record_approval_resolution("ENROLLMENT", "approved");
        record_approvals_expired(3);
        record_fanout_event("POINTS_ADDED", 1);
        record_fanout_dropped("POINTS_ADDED");
        set_realtime_sessions(2.0);
    }
}
