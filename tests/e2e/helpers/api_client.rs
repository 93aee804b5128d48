//! REST API 客户端
//!
//! 封装对 loyalty-api 的 HTTP 调用，返回状态码和原始 JSON 响应体，
//! 方便断言错误码与 data 字段。

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// API 客户端，携带固定身份的 Token
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("创建 HTTP 客户端失败");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    // ========== 积分 API ==========

    pub async fn award(
        &self,
        customer_id: i64,
        program_id: i64,
        points: i64,
        transaction_ref: Option<&str>,
    ) -> Result<(StatusCode, Value)> {
        let mut body = json!({
            "customerId": customer_id,
            "programId": program_id,
            "points": points,
        });
        if let Some(transaction_ref) = transaction_ref {
            body["transactionRef"] = json!(transaction_ref);
        }
        self.send(Method::POST, "/api/award-points", Some(body)).await
    }

    pub async fn list_cards(&self) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, "/api/cards", None).await
    }

    pub async fn list_transactions(&self, card_id: i64) -> Result<(StatusCode, Value)> {
        self.send(
            Method::GET,
            &format!("/api/cards/{card_id}/transactions"),
            None,
        )
        .await
    }

    // ========== 审批 API ==========

    pub async fn create_approval(
        &self,
        customer_id: i64,
        request_type: &str,
        entity_id: i64,
        data: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut body = json!({
            "customerId": customer_id,
            "requestType": request_type,
            "entityId": entity_id,
        });
        if let Some(data) = data {
            body["data"] = data;
        }
        self.send(Method::POST, "/api/approval-requests", Some(body))
            .await
    }

    pub async fn list_pending_approvals(&self) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, "/api/approval-requests/pending", None)
            .await
    }

    pub async fn get_approval(&self, request_id: i64) -> Result<(StatusCode, Value)> {
        self.send(
            Method::GET,
            &format!("/api/approval-requests/{request_id}"),
            None,
        )
        .await
    }

    pub async fn respond(&self, request_id: i64, approved: bool) -> Result<(StatusCode, Value)> {
        self.send(
            Method::PUT,
            &format!("/api/approval-requests/{request_id}/respond"),
            Some(json!({ "approved": approved })),
        )
        .await
    }

    // ========== 通知 API ==========

    pub async fn list_notifications(&self) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, "/api/notifications", None).await
    }

    pub async fn list_pending_notifications(&self) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, "/api/notifications/pending", None)
            .await
    }

    pub async fn mute(&self, muted_types: &[&str]) -> Result<(StatusCode, Value)> {
        self.send(
            Method::PUT,
            "/api/notifications/preferences",
            Some(json!({ "mutedTypes": muted_types })),
        )
        .await
    }

    // ========== 通用方法 ==========

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url).bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok((status, value))
    }
}
