//! 设备端实时推送客户端
//!
//! - `client`: 自动重连的连接循环，退避上限 60 秒并带抖动
//! - `reachability`: 网络可达性门控，离线时推迟重连
//! - `transport`: 传输抽象与 WebSocket 实现
//! - `subscription`: 合并推送与轮询的刷新订阅
//!
//! ```ignore
//! use loyalty_realtime::{ClientConfig, RealtimeClient, ReachabilityMonitor, WsTransport};
//!
//! let reachability = ReachabilityMonitor::default();
//! let transport = WsTransport::new("ws://localhost:8080/ws", token);
//! let (client, events) = RealtimeClient::start(transport, reachability.subscribe(), ClientConfig::default());
//! ```

pub mod client;
pub mod error;
pub mod reachability;
pub mod state;
pub mod subscription;
pub mod transport;

pub use client::{ClientConfig, RealtimeClient};
pub use error::{ClientError, Result};
pub use reachability::{Reachability, ReachabilityMonitor};
pub use state::{ConnectionState, RealtimeEvent};
pub use subscription::{
    HttpPendingSource, MergedSubscription, PendingNotification, PendingSource, RefreshOrigin,
    RefreshSignal,
};
pub use transport::{Connection, Transport, WsTransport};
