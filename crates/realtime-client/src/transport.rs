//! 传输层
//!
//! 重连循环只依赖 `Transport` 与 `Connection` 两个 trait，
//! 生产环境使用 WebSocket，测试使用脚本化的假实现。

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Message, http::header};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::state::RealtimeEvent;

/// 建立连接
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// 一次已建立的连接
#[async_trait]
pub trait Connection: Send {
    /// 下一条事件
    ///
    /// 返回 None 表示服务端正常关闭，`Some(Err)` 表示连接异常中断。
    async fn next_event(&mut self) -> Option<Result<RealtimeEvent>>;

    /// 主动关闭
    async fn close(&mut self);
}

/// WebSocket 传输，携带 Bearer Token 握手
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    token: String,
}

impl WsTransport {
    /// url 形如 `ws://host:port/ws`
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        request.headers_mut().insert(header::AUTHORIZATION, bearer);

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        debug!(status = %response.status(), url = %self.url, "WebSocket 握手完成");

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_event(&mut self) -> Option<Result<RealtimeEvent>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                    Ok(event) => return Some(Ok(event)),
                    // 单条坏消息不值得重连
                    Err(e) => warn!(error = %e, "无法解析的推送消息，已跳过"),
                },
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Err(ClientError::Transport(e.to_string())));
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "服务端关闭连接");
                    return None;
                }
                Ok(_) => {}
                Err(e) => return Some(Err(ClientError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "关闭 WebSocket 时出错");
        }
    }
}
