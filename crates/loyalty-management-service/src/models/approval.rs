//! 审批请求实体定义

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ApprovalRequestType, ApprovalStatus};

/// 审批请求默认有效期（天）
pub const DEFAULT_APPROVAL_TTL_DAYS: i64 = 7;

/// 审批请求
///
/// 由商家发起、顾客处理的待确认操作。状态只能从 PENDING 迁移一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: i64,
    pub customer_id: i64,
    pub business_id: i64,
    pub request_type: ApprovalRequestType,
    /// ENROLLMENT 时为 program id，POINTS_DEDUCTION 时为 card id
    pub entity_id: i64,
    pub payload: serde_json::Value,
    pub status: ApprovalStatus,
    /// 关联的待处理通知
    #[sqlx(default)]
    pub notification_id: Option<i64>,
    /// 批准后产生或作用的会员卡
    #[sqlx(default)]
    pub result_card_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// PENDING 且已过截止时间
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && self.expires_at <= now
    }

    /// 读取时的有效状态：过期但尚未被扫描的请求按 EXPIRED 呈现
    pub fn effective_status(&self, now: DateTime<Utc>) -> ApprovalStatus {
        if self.is_overdue(now) {
            ApprovalStatus::Expired
        } else {
            self.status
        }
    }

    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }

    /// 扣减请求的积分数
    pub fn requested_points(&self) -> Option<i64> {
        self.payload.get("points").and_then(|v| v.as_i64())
    }
}

/// 待创建的审批请求
#[derive(Debug, Clone, PartialEq)]
pub struct NewApprovalRequest {
    pub customer_id: i64,
    pub business_id: i64,
    pub request_type: ApprovalRequestType,
    pub entity_id: i64,
    pub payload: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

/// 根据有效期计算截止时间
pub fn expiry_from(now: DateTime<Utc>, ttl: Option<Duration>) -> DateTime<Utc> {
    now + ttl.unwrap_or_else(|| Duration::days(DEFAULT_APPROVAL_TTL_DAYS))
}
