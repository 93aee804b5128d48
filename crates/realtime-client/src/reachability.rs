//! 网络可达性
//!
//! 由宿主平台的网络监听写入，重连循环只读取。

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reachability {
    /// 尚未得到平台通知，按可达处理
    #[default]
    Unknown,
    Online,
    Offline,
}

impl Reachability {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}

/// 可达性发布端
#[derive(Debug)]
pub struct ReachabilityMonitor {
    tx: watch::Sender<Reachability>,
}

impl ReachabilityMonitor {
    pub fn new(initial: Reachability) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// 更新可达性，值未变化时不唤醒订阅者
    pub fn set(&self, reachability: Reachability) {
        self.tx.send_if_modified(|current| {
            if *current == reachability {
                false
            } else {
                *current = reachability;
                true
            }
        });
    }

    pub fn current(&self) -> Reachability {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.tx.subscribe()
    }
}

impl Default for ReachabilityMonitor {
    fn default() -> Self {
        Self::new(Reachability::Unknown)
    }
}

/// 等待直到不再处于离线状态
///
/// 发布端被丢弃后视为可达。
pub async fn wait_until_reachable(rx: &mut watch::Receiver<Reachability>) {
    let _ = rx.wait_for(|r| !r.is_offline()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_when_online() {
        let monitor = ReachabilityMonitor::new(Reachability::Offline);
        let mut rx = monitor.subscribe();
        let mut waiter = tokio_test::task::spawn(wait_until_reachable(&mut rx));

        tokio_test::assert_pending!(waiter.poll());
        // Offline -> Offline 不算变化，不会唤醒
        monitor.set(Reachability::Offline);
        assert!(!waiter.is_woken());
        tokio_test::assert_pending!(waiter.poll());

        monitor.set(Reachability::Online);
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn test_unknown_counts_as_reachable() {
        let monitor = ReachabilityMonitor::default();
        let mut rx = monitor.subscribe();
        tokio::time::timeout(Duration::from_millis(50), wait_until_reachable(&mut rx))
            .await
            .unwrap();
        assert_eq!(monitor.current(), Reachability::Unknown);
    }
}
