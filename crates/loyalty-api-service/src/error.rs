//! API 错误类型
//!
//! 统一将服务层错误映射为 HTTP 状态码与 JSON 错误体

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loyalty_management::LoyaltyError;
use serde_json::json;
use thiserror::Error;

/// API 错误
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] LoyaltyError),

    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 截止时间内未拿到结果，写操作可能已经生效
    #[error("处理超时，结果未知，请使用相同的交易号重试")]
    OutcomeUnknown { transaction_ref: Option<String> },

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::OutcomeUnknown { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Service(e) => match e {
                LoyaltyError::Validation(_) => StatusCode::BAD_REQUEST,
                LoyaltyError::Forbidden(_) => StatusCode::FORBIDDEN,
                LoyaltyError::ProgramNotFound(_)
                | LoyaltyError::CustomerNotFound(_)
                | LoyaltyError::CardNotFound(_)
                | LoyaltyError::RequestNotFound(_)
                | LoyaltyError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
                LoyaltyError::ProgramInactive(_)
                | LoyaltyError::CardInactive(_)
                | LoyaltyError::TransactionRefConflict(_)
                | LoyaltyError::AlreadyResolved { .. } => StatusCode::CONFLICT,
                LoyaltyError::RequestExpired(_) => StatusCode::GONE,
                LoyaltyError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LoyaltyError::DependencyUnavailable(_)
                | LoyaltyError::Database(_)
                | LoyaltyError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                LoyaltyError::Serialization(_) | LoyaltyError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Service(e) => e.error_code(),
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OutcomeUnknown { .. } => "OUTCOME_UNKNOWN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 客户端是否可以原样重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(e) => e.is_retryable(),
            Self::OutcomeUnknown { .. } => true,
            _ => false,
        }
    }

    /// 附加在错误体中的结构化数据
    fn detail(&self) -> serde_json::Value {
        match self {
            Self::Service(LoyaltyError::AlreadyResolved { request_id, status }) => {
                json!({ "requestId": request_id, "status": status })
            }
            Self::Service(LoyaltyError::InsufficientBalance {
                card_id,
                required,
                available,
            }) => json!({ "cardId": card_id, "required": required, "available": available }),
            Self::OutcomeUnknown { transaction_ref } => json!({ "transactionRef": transaction_ref }),
            _ => serde_json::Value::Null,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Service(e) if !e.is_business_error() => {
                tracing::error!(error = %e, code = e.error_code(), "服务层系统错误");
                if e.is_retryable() {
                    "服务暂不可用，请稍后重试".to_string()
                } else {
                    "服务内部错误，请稍后重试".to_string()
                }
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "error": message,
            "retryable": self.is_retryable(),
            "data": self.detail(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
