//! 请求 DTO 定义

use loyalty_management::dto::{AwardPointsRequest, CreateApprovalRequest};
use loyalty_management::{ApprovalRequestType, NotificationType};
use serde::Deserialize;
use validator::Validate;

/// 单次查询的最大条数
pub const MAX_LIST_LIMIT: i64 = 200;
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// 审批有效期上限（30 天）
const MAX_TTL_SECONDS: i64 = 30 * 24 * 3600;

/// 商家发放积分
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AwardPointsBody {
    #[validate(range(min = 1, message = "customerId 必须为正整数"))]
    pub customer_id: i64,
    #[validate(range(min = 1, message = "programId 必须为正整数"))]
    pub program_id: i64,
    #[validate(range(min = 1, message = "积分必须为正整数"))]
    pub points: i64,
    #[validate(length(min = 1, max = 50, message = "来源长度必须在1-50个字符之间"))]
    pub source: Option<String>,
    #[validate(length(max = 500, message = "描述不超过500字符"))]
    pub description: Option<String>,
    /// 客户端自带的幂等键，重试时沿用
    #[validate(length(min = 1, max = 128, message = "交易号长度必须在1-128个字符之间"))]
    pub transaction_ref: Option<String>,
}

impl AwardPointsBody {
    pub fn into_request(self, business_id: i64, transaction_ref: String) -> AwardPointsRequest {
        let mut request =
            AwardPointsRequest::new(business_id, self.customer_id, self.program_id, self.points)
                .with_ref(transaction_ref);
        request.source = self.source;
        request.description = self.description;
        request
    }
}

/// 商家发起审批请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateApprovalBody {
    #[validate(range(min = 1, message = "customerId 必须为正整数"))]
    pub customer_id: i64,
    pub request_type: ApprovalRequestType,
    #[validate(range(min = 1, message = "entityId 必须为正整数"))]
    pub entity_id: i64,
    /// 扣减请求需携带 {"points": n}
    pub data: Option<serde_json::Value>,
    #[validate(range(min = 60, max = 2592000, message = "有效期必须在60秒到30天之间"))]
    pub ttl_seconds: Option<i64>,
}

impl CreateApprovalBody {
    pub fn into_request(self, business_id: i64) -> CreateApprovalRequest {
        CreateApprovalRequest {
            customer_id: self.customer_id,
            business_id,
            request_type: self.request_type,
            entity_id: self.entity_id,
            payload: self
                .data
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            ttl: self
                .ttl_seconds
                .map(|s| chrono::Duration::seconds(s.min(MAX_TTL_SECONDS))),
        }
    }
}

/// 顾客处理审批
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RespondBody {
    pub approved: bool,
}

/// 更新推送偏好
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePreferencesBody {
    #[validate(length(max = 16, message = "静音类型过多"))]
    pub muted_types: Vec<NotificationType>,
}

/// 列表查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// 归一到 [1, MAX_LIST_LIMIT]
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}
