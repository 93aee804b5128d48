//! 通知扇出模块
//!
//! 负责站内通知的持久化与实时推送。
//!
//! ## 功能特性
//!
//! - **持久化**：每条通知先落库，顾客离线时通过列表接口补齐
//! - **实时推送**：按顾客维护在线会话，向所有会话推送事件
//! - **不阻塞**：推送使用有界队列 + try_send，慢会话只会丢事件，不会拖住业务流程
//! - **推送偏好**：被静音的类型只落库不推送
//!
//! ## 使用示例
//!
//! ```ignore
//! let fanout = NotificationFanout::new(notifications, preferences, RealtimeHub::new(64));
//!
//! let mut subscription = fanout.subscribe(customer_id);
//! fanout.publish(NotificationBuilder::points_added(...)).await?;
//! let event = subscription.recv().await;
//! ```

pub mod fanout;
pub mod hub;
pub mod types;

pub use fanout::NotificationFanout;
pub use hub::{RealtimeHub, Subscription};
pub use types::{FanoutEvent, NotificationBuilder};
