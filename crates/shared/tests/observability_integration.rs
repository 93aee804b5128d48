//! 可观测性模块集成测试
//!
//! 使用局部 Prometheus recorder 采集指标，断言渲染结果；
//! 中间件部分通过 oneshot 驱动一个最小路由。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use loyalty_shared::observability::metrics::{
        record_approval_resolution, record_approvals_expired, record_fanout_dropped,
        record_fanout_event, record_http_request, record_ledger_transaction, record_points_award,
        set_realtime_sessions,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;

    /// 在局部 recorder 下执行并返回渲染后的文本
    fn render(record: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, record);
        handle.render()
    }

    /// 查找同时包含全部标签的样本行，返回其数值
    fn sample(output: &str, name: &str, labels: &[&str]) -> Option<String> {
        output
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter(|line| {
                line.split([' ', '{']).next() == Some(name)
                    && labels.iter().all(|l| line.contains(l))
            })
            .find_map(|line| line.rsplit(' ').next().map(str::to_string))
    }

    #[test]
    fn test_points_award_metrics() {
        let output = render(|| {
            record_points_award("pos", "applied", 0.01);
            record_points_award("pos", "applied", 0.02);
            record_points_award("pos", "replayed", 0.001);
            record_ledger_transaction("CREDIT", false);
        });

        assert!(output.contains("points_awards_total"));
        assert!(output.contains(r#"outcome="replayed""#));
        assert!(output.contains("points_award_duration_seconds"));
        assert_eq!(
            sample(&output, "ledger_transactions_total", &[r#"kind="CREDIT""#, r#"replayed="false""#]),
            Some("1".into())
        );
    }

    #[test]
    fn test_approval_metrics() {
        let output = render(|| {
            record_approval_resolution("ENROLLMENT", "approved");
            record_approval_resolution("POINTS_DEDUCTION", "declined");
            record_approvals_expired(3);
            record_approvals_expired(2);
        });

        assert_eq!(
            sample(
                &output,
                "approval_resolutions_total",
                &[r#"request_type="ENROLLMENT""#, r#"outcome="approved""#]
            ),
            Some("1".into())
        );
        assert_eq!(sample(&output, "approvals_expired_total", &[]), Some("5".into()));
    }

    #[test]
    fn test_fanout_metrics() {
        let output = render(|| {
            record_fanout_event("POINTS_ADDED", 2);
            record_fanout_event("POINTS_ADDED", 0);
            record_fanout_dropped("POINTS_ADDED");
            set_realtime_sessions(4.0);
        });

        for delivered in [r#"delivered="true""#, r#"delivered="false""#] {
            assert_eq!(
                sample(&output, "fanout_events_total", &[r#"event_type="POINTS_ADDED""#, delivered]),
                Some("1".into())
            );
        }
        assert_eq!(
            sample(&output, "fanout_events_dropped_total", &[]),
            Some("1".into())
        );
        assert_eq!(sample(&output, "realtime_sessions", &[]), Some("4".into()));
    }

    #[test]
    fn test_metrics_without_recorder_are_noop() {
        // 未安装全局 recorder 时不应 panic
        record_http_request("", "", 0, 0.0);
        record_http_request("GET", "/api/cards/{id}/transactions", 200, 999.99);
        record_points_award("", "rejected", 0.0);
        record_approvals_expired(0);
    }
}

// ============================================================================
// 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use loyalty_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/cards/{id}",
                get(|Extension(id): Extension<RequestId>| async move { id.as_str().to_string() }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_generated_when_missing() {
        let response = app()
            .oneshot(Request::get("/cards/7").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header = response
            .headers()
            .get("x-request-id")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(header.len(), 36, "应为 UUID 格式: {header}");
    }

    #[tokio::test]
    async fn test_request_id_visible_to_handler() {
        use http_body_util::BodyExt;

        let response = app()
            .oneshot(
                Request::get("/cards/7")
                    .header("x-request-id", "trace-abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-abc");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"trace-abc");
    }

    #[tokio::test]
    async fn test_tracing_passes_unmatched_routes_through() {
        let response = app()
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
