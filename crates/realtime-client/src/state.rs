//! 连接状态与事件

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 连接状态
///
/// Disconnected → Connecting → Connected → (Disconnected | Closed)，
/// Closed 只能由 `close()` 进入且不再离开。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// 服务端推送的事件
///
/// 客户端只依据 type 与 notificationId 刷新本地缓存，data 原样透传。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub notification_id: Option<i64>,
    #[serde(default)]
    pub reference_id: Option<i64>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}
