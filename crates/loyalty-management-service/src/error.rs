//! 积分服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use thiserror::Error;

use crate::models::ApprovalStatus;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === 参数与权限 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("无权操作: {0}")]
    Forbidden(String),

    // === 目录与会员卡 ===
    #[error("会员计划不存在: {0}")]
    ProgramNotFound(i64),

    #[error("会员计划已停用: {0}")]
    ProgramInactive(i64),

    #[error("顾客不存在: {0}")]
    CustomerNotFound(i64),

    #[error("会员卡不存在: {0}")]
    CardNotFound(i64),

    #[error("会员卡未激活: {0}")]
    CardInactive(i64),

    #[error("积分余额不足: card_id={card_id}, 需要 {required}, 可用 {available}")]
    InsufficientBalance {
        card_id: i64,
        required: i64,
        available: i64,
    },

    #[error("transaction_ref 已用于另一笔操作: {0}")]
    TransactionRefConflict(String),

    // === 审批 ===
    #[error("审批请求不存在: {0}")]
    RequestNotFound(i64),

    #[error("审批请求已处理: request_id={request_id}, status={status:?}")]
    AlreadyResolved {
        request_id: i64,
        status: ApprovalStatus,
    },

    #[error("审批请求已过期: {0}")]
    RequestExpired(i64),

    // === 通知 ===
    #[error("通知不存在: {0}")]
    NotificationNotFound(i64),

    // === 系统错误 ===
    #[error("依赖步骤失败: {0}")]
    DependencyUnavailable(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Storage(_) | Self::DependencyUnavailable(_)
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Storage(_)
                | Self::Serialization(_)
                | Self::Internal(_)
                | Self::DependencyUnavailable(_)
        )
    }

    /// 是否为"资源不存在"一类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProgramNotFound(_)
                | Self::CustomerNotFound(_)
                | Self::CardNotFound(_)
                | Self::RequestNotFound(_)
                | Self::NotificationNotFound(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::ProgramNotFound(_) => "PROGRAM_NOT_FOUND",
            Self::ProgramInactive(_) => "PROGRAM_INACTIVE",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::CardNotFound(_) => "CARD_NOT_FOUND",
            Self::CardInactive(_) => "CARD_INACTIVE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::TransactionRefConflict(_) => "TRANSACTION_REF_CONFLICT",
            Self::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            Self::AlreadyResolved { .. } => "ALREADY_RESOLVED",
            Self::RequestExpired(_) => "REQUEST_EXPIRED",
            Self::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Database(_) | Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
