//! 实时推送 WebSocket 处理器
//!
//! 顾客握手时通过 `?token=` 或 Authorization 头认证，
//! 之后服务端把该顾客的通知事件逐条以 JSON 文本帧推送。

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use loyalty_management::Subscription;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// GET /ws
///
/// 先认证再检查升级请求，未认证的调用方总是得到 401。
pub async fn realtime_socket(
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    let token = query
        .token
        .as_deref()
        .or(header_token)
        .ok_or_else(|| ApiError::Unauthorized("缺少认证 Token".into()))?;

    let customer_id = state.jwt.authenticate(token)?.customer_id()?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    // 握手前先订阅，升级完成前产生的事件也不会丢
    let subscription = state.services.fanout.subscribe(customer_id);
    Ok(ws.on_upgrade(move |socket| run_session(socket, subscription)))
}

async fn run_session(socket: WebSocket, mut subscription: Subscription) {
    let customer_id = subscription.customer_id();
    let session_id = subscription.session_id();
    info!(customer_id, session_id, "实时会话已建立");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(customer_id, error = %e, "事件序列化失败，跳过");
                        continue;
                    }
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(customer_id, error = %e, "读取客户端消息失败");
                        break;
                    }
                    // 客户端发来的其他帧不影响推送
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(customer_id, session_id, "实时会话已结束");
}
