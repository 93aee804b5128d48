//! 响应 DTO 定义

use loyalty_management::ApprovalStatus;
use loyalty_management::dto::ApprovalResolution;
use serde::Serialize;

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// 审批处理结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondResponse {
    pub request_id: i64,
    pub status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<i64>,
    pub replayed: bool,
}

impl From<ApprovalResolution> for RespondResponse {
    fn from(resolution: ApprovalResolution) -> Self {
        Self {
            request_id: resolution.request.id,
            status: resolution.request.status,
            card_id: resolution.card_id,
            replayed: resolution.replayed,
        }
    }
}

/// 审批处理响应，cardId 提升到顶层，data 中保留完整结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondEnvelope {
    #[serde(flatten)]
    pub response: ApiResponse<RespondResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<i64>,
}

impl From<ApprovalResolution> for RespondEnvelope {
    fn from(resolution: ApprovalResolution) -> Self {
        let data = RespondResponse::from(resolution);
        Self {
            card_id: data.card_id,
            response: ApiResponse::success(data),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: u64,
}
