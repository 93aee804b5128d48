//! 日志与分布式追踪
//!
//! 日志总是输出到 stdout；配置了 OTLP 端点时额外把 span 导出到追踪后端。

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::ObservabilityConfig;

/// 依赖库的默认日志级别，避免连接池和 WebSocket 帧日志淹没业务日志
const QUIET_DEPENDENCIES: &[&str] = &[
    "sqlx=warn",
    "hyper=warn",
    "tungstenite=warn",
    "tokio_tungstenite=warn",
    "h2=warn",
];

/// 持有 TracerProvider，Drop 时刷新未导出的 span
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("关闭 TracerProvider 失败: {e:?}");
        }
    }
}

/// 初始化全局 subscriber
///
/// `RUST_LOG` 优先于配置中的 log_level。
pub fn init(config: &ObservabilityConfig, service_name: &str) -> Result<TracingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| build_filter(&config.log_level));

    let fmt_layer = if config.json_logs() {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let provider = match config.otlp_endpoint() {
        Some(endpoint) => Some(init_tracer_provider(
            service_name,
            endpoint,
            config.trace_sample_ratio,
        )?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(TracingGuard { provider })
}

/// 业务日志按配置级别输出，依赖库统一压到 warn
fn build_filter(log_level: &str) -> EnvFilter {
    let directives = std::iter::once(log_level)
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 上游已采样的请求总是继续采样
fn sampler(ratio: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(clamp_ratio(ratio))))
}

/// 采样比例越界时截断到 [0, 1]，NaN 按全量采样
fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() { 1.0 } else { ratio.clamp(0.0, 1.0) }
}

fn init_tracer_provider(
    service_name: &str,
    endpoint: &str,
    sample_ratio: f64,
) -> Result<SdkTracerProvider> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(sampler(sample_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(provider)
}

/// 当前 span 的 trace ID，未接入追踪时为 None
pub fn current_trace_id() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let context = tracing::Span::current().context();
    let span_context = context.span().span_context().clone();

    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_trace_id_without_init() {
        assert!(current_trace_id().is_none());
    }

    #[test]
    fn test_filter_quiets_dependencies() {
        let filter = build_filter("debug").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("sqlx=warn"));
        assert!(filter.contains("tungstenite=warn"));
    }

    #[test]
    fn test_invalid_level_falls_back_to_info() {
        assert_eq!(build_filter("loud=???").to_string(), "info");
    }

    #[test]
    fn test_sampler_clamps_ratio() {
        assert_eq!(clamp_ratio(3.0), 1.0);
        assert_eq!(clamp_ratio(-0.5), 0.0);
        assert_eq!(clamp_ratio(f64::NAN), 1.0);
        assert_eq!(clamp_ratio(0.25), 0.25);
        assert!(matches!(sampler(0.25), Sampler::ParentBased(_)));
    }
}
