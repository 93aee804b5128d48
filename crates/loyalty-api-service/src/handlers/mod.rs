//! HTTP 处理器

pub mod approval;
pub mod award;
pub mod card;
pub mod health;
pub mod notification;
pub mod realtime;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;

/// 在截止时间内等待写操作的结果
///
/// 写操作在独立任务中执行，超时只放弃等待，不中断落账；
/// 调用方拿到 OUTCOME_UNKNOWN 后用同一个交易号重试即可收敛到唯一结果。
pub(crate) async fn with_deadline<T, F>(
    deadline: Duration,
    transaction_ref: Option<String>,
    work: F,
) -> Result<T, ApiError>
where
    F: Future<Output = loyalty_management::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(work);
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(join_error)) => Err(ApiError::Internal(format!(
            "处理任务异常终止: {join_error}"
        ))),
        Err(_) => {
            warn!(
                ?transaction_ref,
                timeout_ms = deadline.as_millis() as u64,
                "请求超时，结果未知"
            );
            Err(ApiError::OutcomeUnknown { transaction_ref })
        }
    }
}
