//! 在线会话注册表
//!
//! 按顾客登记所有在线会话（多设备），事件向该顾客的每个会话各投递一份。

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use loyalty_shared::observability::metrics;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::types::FanoutEvent;

struct SessionSlot {
    session_id: u64,
    sender: mpsc::Sender<FanoutEvent>,
}

/// 在线会话注册表
pub struct RealtimeHub {
    sessions: DashMap<i64, Vec<SessionSlot>>,
    capacity: usize,
    next_session_id: AtomicU64,
    connected: AtomicI64,
}

impl RealtimeHub {
    /// capacity 为每个会话的待发送队列长度
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
            next_session_id: AtomicU64::new(0),
            connected: AtomicI64::new(0),
        })
    }

    /// 为顾客登记一个新会话，返回的订阅被 drop 时自动注销
    pub fn subscribe(self: &Arc<Self>, customer_id: i64) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;

        self.sessions
            .entry(customer_id)
            .or_default()
            .push(SessionSlot { session_id, sender });

        let connected = self.connected.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_realtime_sessions(connected as f64);
        debug!(customer_id, session_id, "实时会话已登记");

        Subscription {
            customer_id,
            session_id,
            receiver,
            hub: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, customer_id: i64, session_id: u64) {
        let mut removed = false;
        if let Some(mut slots) = self.sessions.get_mut(&customer_id) {
            let before = slots.len();
            slots.retain(|slot| slot.session_id != session_id);
            removed = slots.len() != before;
        }
        self.sessions.remove_if(&customer_id, |_, slots| slots.is_empty());

        if removed {
            let connected = self.connected.fetch_sub(1, Ordering::Relaxed) - 1;
            metrics::set_realtime_sessions(connected as f64);
            debug!(customer_id, session_id, "实时会话已注销");
        }
    }

    /// 向顾客的所有在线会话投递事件，返回成功入队的会话数
    ///
    /// 不会等待：队列满的会话丢弃本次事件，已关闭的会话被清理。
    pub fn emit(&self, customer_id: i64, event: &FanoutEvent) -> usize {
        let Some(mut slots) = self.sessions.get_mut(&customer_id) else {
            return 0;
        };

        let mut delivered = 0;
        slots.retain(|slot| match slot.sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    customer_id,
                    session_id = slot.session_id,
                    event_type = event.event_type.as_str(),
                    "会话队列已满，丢弃实时事件"
                );
                metrics::record_fanout_dropped(event.event_type.as_str());
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        drop(slots);

        self.sessions.remove_if(&customer_id, |_, slots| slots.is_empty());
        delivered
    }

    /// 顾客当前在线会话数
    pub fn session_count(&self, customer_id: i64) -> usize {
        self.sessions
            .get(&customer_id)
            .map(|slots| slots.len())
            .unwrap_or(0)
    }
}

/// 单个会话的事件订阅
pub struct Subscription {
    customer_id: i64,
    session_id: u64,
    receiver: mpsc::Receiver<FanoutEvent>,
    hub: Weak<RealtimeHub>,
}

impl Subscription {
    pub fn customer_id(&self) -> i64 {
        self.customer_id
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// 等待下一条事件，注册表被销毁时返回 None
    pub async fn recv(&mut self) -> Option<FanoutEvent> {
        self.receiver.recv().await
    }

    /// 非阻塞读取
    pub fn try_recv(&mut self) -> Option<FanoutEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.customer_id, self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use chrono::Utc;

    fn event(id: i64) -> FanoutEvent {
        FanoutEvent {
            event_type: NotificationType::PointsAdded,
            notification_id: Some(id),
            reference_id: None,
            data: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_every_session_of_customer() {
        let hub = RealtimeHub::new(8);
        let mut phone = hub.subscribe(1);
        let mut tablet = hub.subscribe(1);
        let mut other = hub.subscribe(2);

        assert_eq!(hub.emit(1, &event(10)), 2);

        assert_eq!(phone.recv().await.unwrap().notification_id, Some(10));
        assert_eq!(tablet.recv().await.unwrap().notification_id, Some(10));
        assert!(other.try_recv().is_none());
    }

    #[test]
    fn test_recv_waits_for_emit() {
        let hub = RealtimeHub::new(8);
        let mut sub = hub.subscribe(3);
        let mut recv = tokio_test::task::spawn(sub.recv());

        tokio_test::assert_pending!(recv.poll());
        hub.emit(3, &event(7));
        assert!(recv.is_woken());
        let received = tokio_test::assert_ready!(recv.poll());
        assert_eq!(received.unwrap().notification_id, Some(7));
    }

    #[tokio::test]
    async fn test_emit_without_sessions_is_noop() {
        let hub = RealtimeHub::new(8);
        assert_eq!(hub.emit(42, &event(1)), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let hub = RealtimeHub::new(2);
        let mut sub = hub.subscribe(1);

        assert_eq!(hub.emit(1, &event(1)), 1);
        assert_eq!(hub.emit(1, &event(2)), 1);
        // 第三条被丢弃，会话仍保留
        assert_eq!(hub.emit(1, &event(3)), 0);
        assert_eq!(hub.session_count(1), 1);

        assert_eq!(sub.recv().await.unwrap().notification_id, Some(1));
        assert_eq!(sub.recv().await.unwrap().notification_id, Some(2));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_subscription_unregisters() {
        let hub = RealtimeHub::new(4);
        let sub = hub.subscribe(1);
        let _other = hub.subscribe(1);
        assert_eq!(hub.session_count(1), 2);

        drop(sub);
        assert_eq!(hub.session_count(1), 1);
    }
}
