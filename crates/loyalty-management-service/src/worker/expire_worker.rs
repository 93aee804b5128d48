//! 审批过期扫描
//!
//! 定期把已过截止时间的 PENDING 请求持久化为 EXPIRED。
//! 读取路径按有效状态判断，扫描只是让存储与呈现保持一致。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::service::ApprovalService;

/// 审批过期扫描器
pub struct ExpireWorker {
    approvals: Arc<ApprovalService>,
    interval: Duration,
    batch_size: i64,
}

impl ExpireWorker {
    pub fn new(approvals: Arc<ApprovalService>, interval: Duration, batch_size: i64) -> Self {
        Self {
            approvals,
            interval,
            batch_size: batch_size.max(1),
        }
    }

    /// 扫描一轮，批次满时继续扫描直到清空
    pub async fn run_once(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let expired = self.approvals.expire_overdue(self.batch_size).await?;
            total += expired;
            if (expired as i64) < self.batch_size {
                break;
            }
        }
        if total > 0 {
            info!(expired = total, "审批请求过期扫描完成");
        }
        Ok(total)
    }

    /// 启动扫描循环，直到收到 shutdown 信号
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "审批过期扫描已启动"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        // 下一轮重试
                        error!(error = %e, retryable = e.is_retryable(), "审批过期扫描失败");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    debug!("收到非停止的 shutdown 信号变更");
                }
            }
        }

        info!("审批过期扫描已停止");
    }
}
