//! 合并推送与轮询的刷新订阅
//!
//! 推送事件与定期对账的待处理通知汇成一路刷新信号，
//! 按 (notificationId, type) 去重，一次变更只触发一次刷新。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::state::{ConnectionState, RealtimeEvent};

/// 去重窗口大小
const SEEN_CAPACITY: usize = 1024;

/// 服务端的待处理通知
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotification {
    pub id: i64,
    pub notification_type: String,
    #[serde(default)]
    pub reference_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 待处理通知来源
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PendingSource: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<PendingNotification>>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
}

/// 通过 HTTP 拉取 `/api/notifications/pending`
#[derive(Debug, Clone)]
pub struct HttpPendingSource {
    http: reqwest::Client,
    url: String,
    token: String,
    policy: RetryPolicy,
}

impl HttpPendingSource {
    /// base_url 形如 `http://host:port`
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}/api/notifications/pending", base_url.trim_end_matches('/')),
            token: token.into(),
            policy: RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_millis(500),
                ..RetryPolicy::default()
            },
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch_once(&self) -> Result<Vec<PendingNotification>> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: Envelope<Vec<PendingNotification>> = serde_json::from_slice(&bytes)?;
        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait]
impl PendingSource for HttpPendingSource {
    async fn fetch_pending(&self) -> Result<Vec<PendingNotification>> {
        retry_with_policy(
            &self.policy,
            "fetch_pending_notifications",
            ClientError::is_retryable,
            || self.fetch_once(),
        )
        .await
    }
}

/// 刷新信号来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    Push,
    Poll,
}

/// 一次本地缓存刷新
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    pub event_type: String,
    pub notification_id: Option<i64>,
    pub origin: RefreshOrigin,
}

/// 有界去重集合，超出容量时淘汰最早的键
#[derive(Debug, Default)]
struct SeenSet {
    keys: HashSet<(i64, String)>,
    order: VecDeque<(i64, String)>,
}

impl SeenSet {
    /// 首次出现返回 true
    fn insert(&mut self, id: i64, event_type: &str) -> bool {
        let key = (id, event_type.to_string());
        if self.keys.contains(&key) {
            return false;
        }
        if self.order.len() >= SEEN_CAPACITY
            && let Some(oldest) = self.order.pop_front()
        {
            self.keys.remove(&oldest);
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        true
    }
}

/// 合并后的订阅
pub struct MergedSubscription {
    rx: mpsc::Receiver<RefreshSignal>,
    task: JoinHandle<()>,
}

impl MergedSubscription {
    /// 启动合并任务
    ///
    /// 启动时立即对账一次；传入连接状态时，每次重新连上也会立即对账。
    pub fn start(
        events: mpsc::Receiver<RealtimeEvent>,
        source: Arc<dyn PendingSource>,
        poll_interval: Duration,
        connection: Option<watch::Receiver<ConnectionState>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let merger = Merger {
            events: Some(events),
            source,
            poll_interval,
            connection,
            seen: SeenSet::default(),
            out: tx,
        };
        Self {
            rx,
            task: tokio::spawn(merger.run()),
        }
    }

    pub async fn recv(&mut self) -> Option<RefreshSignal> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<RefreshSignal> {
        self.rx.try_recv().ok()
    }
}

impl Drop for MergedSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Merger {
    events: Option<mpsc::Receiver<RealtimeEvent>>,
    source: Arc<dyn PendingSource>,
    poll_interval: Duration,
    connection: Option<watch::Receiver<ConnectionState>>,
    seen: SeenSet,
    out: mpsc::Sender<RefreshSignal>,
}

impl Merger {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = next_event(&mut self.events) => match event {
                    Some(event) => {
                        if !self.forward_push(event).await {
                            break;
                        }
                    }
                    // 推送端结束后只保留轮询
                    None => self.events = None,
                },
                _ = ticker.tick() => {
                    if !self.poll().await {
                        break;
                    }
                }
                reconnected = next_reconnect(&mut self.connection) => {
                    if reconnected && !self.poll().await {
                        break;
                    }
                }
            }
        }
    }

    async fn forward_push(&mut self, event: RealtimeEvent) -> bool {
        if let Some(id) = event.notification_id
            && !self.seen.insert(id, &event.event_type)
        {
            debug!(notification_id = id, "重复推送，已忽略");
            return true;
        }
        self.emit(RefreshSignal {
            event_type: event.event_type,
            notification_id: event.notification_id,
            origin: RefreshOrigin::Push,
        })
        .await
    }

    async fn poll(&mut self) -> bool {
        let pending = match self.source.fetch_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "拉取待处理通知失败，等待下次对账");
                return true;
            }
        };

        for notification in pending {
            if !self
                .seen
                .insert(notification.id, &notification.notification_type)
            {
                continue;
            }
            let delivered = self
                .emit(RefreshSignal {
                    event_type: notification.notification_type,
                    notification_id: Some(notification.id),
                    origin: RefreshOrigin::Poll,
                })
                .await;
            if !delivered {
                return false;
            }
        }
        true
    }

    /// 订阅者已丢弃时返回 false
    async fn emit(&self, signal: RefreshSignal) -> bool {
        self.out.send(signal).await.is_ok()
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<RealtimeEvent>>) -> Option<RealtimeEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// 等待连接状态变化，返回是否为新连上
async fn next_reconnect(connection: &mut Option<watch::Receiver<ConnectionState>>) -> bool {
    let Some(rx) = connection else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        *connection = None;
        return false;
    }
    rx.borrow_and_update().is_connected()
}
