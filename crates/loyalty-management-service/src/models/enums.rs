//! 积分服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 会员卡状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    /// 正常 - 可发放、可扣减
    #[default]
    Active,
    /// 停用 - 余额保留，但拒绝新的流水
    Inactive,
}

/// 流水方向
///
/// CREDIT 增加余额，DEBIT 减少余额
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    /// 对余额的影响方向
    pub fn sign(&self) -> i64 {
        match self {
            Self::Credit => 1,
            Self::Debit => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

/// 审批请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalRequestType {
    /// 商家邀请顾客加入会员计划，entity_id 为 program id
    Enrollment,
    /// 商家申请扣减顾客积分，entity_id 为 card id
    PointsDeduction,
}

impl ApprovalRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollment => "ENROLLMENT",
            Self::PointsDeduction => "POINTS_DEDUCTION",
        }
    }
}

/// 审批状态
///
/// 只允许从 PENDING 迁移到其余三种终态之一
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Declined,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
        }
    }
}

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    PointsAdded,
    PointsDeducted,
    EnrollmentRequest,
    PointsDeductionRequest,
    /// 审批结果，不落库，仅作为实时事件推送
    ApprovalResolved,
    CardActivated,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointsAdded => "POINTS_ADDED",
            Self::PointsDeducted => "POINTS_DEDUCTED",
            Self::EnrollmentRequest => "ENROLLMENT_REQUEST",
            Self::PointsDeductionRequest => "POINTS_DEDUCTION_REQUEST",
            Self::ApprovalResolved => "APPROVAL_RESOLVED",
            Self::CardActivated => "CARD_ACTIVATED",
        }
    }

    /// 审批请求对应的通知类型
    pub fn for_request(request_type: ApprovalRequestType) -> Self {
        match request_type {
            ApprovalRequestType::Enrollment => Self::EnrollmentRequest,
            ApprovalRequestType::PointsDeduction => Self::PointsDeductionRequest,
        }
    }
}
