//! 自动重连的实时推送客户端
//!
//! 每个设备会话一个协作式循环：接收处理与重连调度不会重叠，
//! `close()` 先置位禁止重连标记，再取消待触发的重连计时器。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use loyalty_shared::retry::RetryPolicy;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::reachability::{Reachability, wait_until_reachable};
use crate::state::{ConnectionState, RealtimeEvent};
use crate::transport::{Connection, Transport};

/// 事件通道默认容量
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 重连退避策略
    pub reconnect: RetryPolicy,
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: RetryPolicy::reconnect(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// 客户端句柄
///
/// 丢弃句柄同样会让后台循环退出，但不会等待它结束。
pub struct RealtimeClient {
    state: watch::Receiver<ConnectionState>,
    attempts: watch::Receiver<u32>,
    closing: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RealtimeClient {
    /// 启动后台连接循环，返回句柄和事件接收端
    pub fn start<T: Transport>(
        transport: T,
        reachability: watch::Receiver<Reachability>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<RealtimeEvent>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (attempts_tx, attempts_rx) = watch::channel(0u32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let closing = Arc::new(AtomicBool::new(false));

        let driver = Driver {
            transport,
            policy: config.reconnect,
            reachability,
            shutdown: shutdown_rx,
            closing: closing.clone(),
            state: state_tx,
            attempts: attempts_tx,
            events: events_tx,
        };
        let task = tokio::spawn(driver.run());

        (
            Self {
                state: state_rx,
                attempts: attempts_rx,
                closing,
                shutdown: shutdown_tx,
                task,
            },
            events_rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 连续失败次数，连接成功后归零
    pub fn attempts(&self) -> u32 {
        *self.attempts.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// 等待进入指定状态
    pub async fn wait_for_state(&self, target: ConnectionState) -> ConnectionState {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|s| *s == target).await.map(|s| *s);
        reached.unwrap_or_else(|_| *rx.borrow())
    }

    /// 关闭客户端并等待后台循环退出
    pub async fn close(self) {
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "实时客户端循环异常退出");
        }
    }
}

struct Driver<T> {
    transport: T,
    policy: RetryPolicy,
    reachability: watch::Receiver<Reachability>,
    shutdown: watch::Receiver<bool>,
    closing: Arc<AtomicBool>,
    state: watch::Sender<ConnectionState>,
    attempts: watch::Sender<u32>,
    events: mpsc::Sender<RealtimeEvent>,
}

/// 一次会话的结束方式
enum SessionEnd {
    /// 用户关闭
    Closed,
    /// 连接中断或握手失败，需要重连
    Lost,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            if self.is_closing() {
                break;
            }

            // 已知离线时推迟重连，不消耗重试次数
            if self.reachability.borrow().is_offline() {
                debug!("网络不可达，推迟重连");
                tokio::select! {
                    _ = wait_until_reachable(&mut self.reachability) => {}
                    _ = self.shutdown.changed() => break,
                }
                if self.is_closing() {
                    break;
                }
            }

            match self.session(&mut attempts).await {
                SessionEnd::Closed => break,
                SessionEnd::Lost => {}
            }

            self.state.send_replace(ConnectionState::Disconnected);
            // 连续失败 N 次后等待 min(60s, 2^N s + 抖动)
            attempts = attempts.saturating_add(1);
            self.attempts.send_replace(attempts);
            let delay = self.policy.delay_for_attempt(attempts);
            info!(attempts, delay_ms = delay.as_millis() as u64, "计划重连");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        self.state.send_replace(ConnectionState::Closed);
        info!("实时客户端已关闭");
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst) || *self.shutdown.borrow()
    }

    async fn session(&mut self, attempts: &mut u32) -> SessionEnd {
        self.state.send_replace(ConnectionState::Connecting);

        let connected = tokio::select! {
            result = self.transport.connect() => result,
            _ = self.shutdown.changed() => return SessionEnd::Closed,
        };
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                warn!(error = %e, attempts = *attempts, "连接失败");
                return SessionEnd::Lost;
            }
        };

        // close() 可能恰好发生在握手完成时
        if self.is_closing() {
            connection.close().await;
            return SessionEnd::Closed;
        }

        *attempts = 0;
        self.attempts.send_replace(0);
        self.state.send_replace(ConnectionState::Connected);
        info!("实时连接已建立");

        self.receive(&mut connection).await
    }

    async fn receive(&mut self, connection: &mut Box<dyn Connection>) -> SessionEnd {
        loop {
            let next = tokio::select! {
                next = connection.next_event() => next,
                _ = self.shutdown.changed() => {
                    connection.close().await;
                    return SessionEnd::Closed;
                }
            };

            match next {
                Some(Ok(event)) => {
                    debug!(event_type = %event.event_type, notification_id = ?event.notification_id, "收到推送");
                    // 消费端已丢弃时继续维持连接，仅丢弃事件
                    tokio::select! {
                        _ = self.events.send(event) => {}
                        _ = self.shutdown.changed() => {
                            connection.close().await;
                            return SessionEnd::Closed;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "连接异常中断");
                    return SessionEnd::Lost;
                }
                None => {
                    info!("服务端关闭了连接");
                    return SessionEnd::Lost;
                }
            }
        }
    }
}
