//! 自定义断言

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

/// 断言成功响应并取出 data
pub fn assert_ok(response: &(StatusCode, Value)) -> &Value {
    let (status, body) = response;
    assert!(status.is_success(), "期望成功，实际 {status}: {body}");
    assert_eq!(body["success"], true, "{body}");
    &body["data"]
}

/// 断言错误响应的状态码与错误码
pub fn assert_error(response: &(StatusCode, Value), status: StatusCode, code: &str) {
    let (actual, body) = response;
    assert_eq!(*actual, status, "{body}");
    assert_eq!(body["success"], false, "{body}");
    assert_eq!(body["code"], code, "{body}");
}

/// 带超时等待，超时即测试失败
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("等待超时")
}
