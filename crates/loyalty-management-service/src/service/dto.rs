//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的 DTO，与内部领域模型解耦

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::{ApprovalRequest, ApprovalRequestType, Transaction};

/// 未指定来源时的默认来源标签
pub const DEFAULT_AWARD_SOURCE: &str = "MANUAL";

/// 审批扣减使用的来源标签
pub const APPROVAL_SOURCE: &str = "APPROVAL";

/// 审批扣减的 transaction_ref 前缀，调用方提交的 ref 不得使用
pub const APPROVAL_REF_PREFIX: &str = "approval-";

/// 审批请求对应的扣减 transaction_ref
pub fn approval_transaction_ref(request_id: i64) -> String {
    format!("{APPROVAL_REF_PREFIX}{request_id}")
}

/// 积分发放请求
#[derive(Debug, Clone, PartialEq)]
pub struct AwardPointsRequest {
    pub business_id: i64,
    pub customer_id: i64,
    pub program_id: i64,
    pub points: i64,
    pub source: Option<String>,
    pub description: Option<String>,
    /// 为空时由服务生成
    pub transaction_ref: Option<String>,
}

impl AwardPointsRequest {
    pub fn new(business_id: i64, customer_id: i64, program_id: i64, points: i64) -> Self {
        Self {
            business_id,
            customer_id,
            program_id,
            points,
            source: None,
            description: None,
            transaction_ref: None,
        }
    }

    pub fn with_ref(mut self, transaction_ref: impl Into<String>) -> Self {
        self.transaction_ref = Some(transaction_ref.into());
        self
    }
}

/// 积分扣减请求
///
/// 扣减总是由调用方给定 transaction_ref，重试时必须沿用。
#[derive(Debug, Clone, PartialEq)]
pub struct DeductPointsRequest {
    pub business_id: i64,
    pub card_id: i64,
    pub points: i64,
    pub source: String,
    pub description: Option<String>,
    pub transaction_ref: String,
}

/// 发放或扣减结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    pub customer_id: i64,
    pub program_id: i64,
    pub points: i64,
    pub card_id: i64,
    pub transaction_id: i64,
    pub transaction_ref: String,
    pub new_balance: i64,
    /// 重复提交时为 true，返回的是原流水
    pub replayed: bool,
}

impl AwardResult {
    pub fn from_transaction(transaction: &Transaction, new_balance: i64, replayed: bool) -> Self {
        Self {
            customer_id: transaction.customer_id,
            program_id: transaction.program_id,
            points: transaction.amount,
            card_id: transaction.card_id,
            transaction_id: transaction.id,
            transaction_ref: transaction.transaction_ref.clone(),
            new_balance,
            replayed,
        }
    }
}

/// 创建审批请求
#[derive(Debug, Clone, PartialEq)]
pub struct CreateApprovalRequest {
    pub customer_id: i64,
    pub business_id: i64,
    pub request_type: ApprovalRequestType,
    pub entity_id: i64,
    pub payload: serde_json::Value,
    /// 为空时使用配置的默认有效期
    pub ttl: Option<Duration>,
}

/// 审批处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResolution {
    pub request: ApprovalRequest,
    /// 批准后产生或作用的会员卡
    pub card_id: Option<i64>,
    /// 相同结果的重复处理
    pub replayed: bool,
}
