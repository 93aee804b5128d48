//! 实时事件与通知模板

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{
    ApprovalRequest, ApprovalRequestType, ApprovalStatus, Card, NewNotification, Notification,
    NotificationType,
};

/// 推送给在线会话的事件
///
/// 客户端只依据 type 和 notificationId 刷新本地缓存，不解析 data。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutEvent {
    #[serde(rename = "type")]
    pub event_type: NotificationType,
    pub notification_id: Option<i64>,
    pub reference_id: Option<i64>,
    pub data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl FanoutEvent {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            event_type: notification.notification_type,
            notification_id: Some(notification.id),
            reference_id: notification.reference_id,
            data: notification.data.clone(),
            occurred_at: notification.created_at,
        }
    }

    /// 审批结果事件，只推送不落库
    pub fn approval_resolved(request: &ApprovalRequest) -> Self {
        Self {
            event_type: NotificationType::ApprovalResolved,
            notification_id: request.notification_id,
            reference_id: Some(request.id),
            data: json!({
                "requestId": request.id,
                "requestType": request.request_type,
                "status": request.status,
                "cardId": request.result_card_id,
            }),
            occurred_at: request.resolved_at.unwrap_or_else(Utc::now),
        }
    }
}

/// 通知构建器
///
/// 提供便捷的通知创建方法
pub struct NotificationBuilder;

impl NotificationBuilder {
    /// 积分到账通知
    pub fn points_added(
        card: &Card,
        program_name: &str,
        customer_name: &str,
        points: i64,
        new_balance: i64,
        transaction_id: i64,
    ) -> NewNotification {
        NewNotification::new(
            card.customer_id,
            NotificationType::PointsAdded,
            "积分到账",
            format!("{customer_name}，您在「{program_name}」获得 {points} 积分，当前余额 {new_balance}"),
        )
        .with_business(card.business_id)
        .with_reference(card.id)
        .with_data(json!({
            "cardId": card.id,
            "programId": card.program_id,
            "points": points,
            "newBalance": new_balance,
            "transactionId": transaction_id,
        }))
    }

    /// 积分扣减通知
    pub fn points_deducted(
        card: &Card,
        points: i64,
        new_balance: i64,
        transaction_id: i64,
    ) -> NewNotification {
        NewNotification::new(
            card.customer_id,
            NotificationType::PointsDeducted,
            "积分扣减",
            format!("您的会员卡扣减 {points} 积分，当前余额 {new_balance}"),
        )
        .with_business(card.business_id)
        .with_reference(card.id)
        .with_data(json!({
            "cardId": card.id,
            "programId": card.program_id,
            "points": points,
            "newBalance": new_balance,
            "transactionId": transaction_id,
        }))
    }

    /// 待顾客处理的审批请求通知
    pub fn approval_request(request: &ApprovalRequest, subject: &str) -> NewNotification {
        let (title, message) = match request.request_type {
            ApprovalRequestType::Enrollment => (
                "会员邀请",
                format!("商家邀请您加入「{subject}」，请确认是否加入"),
            ),
            ApprovalRequestType::PointsDeduction => (
                "积分扣减确认",
                format!(
                    "商家申请扣减 {} 积分，请确认",
                    request.requested_points().unwrap_or_default()
                ),
            ),
        };

        NewNotification::new(
            request.customer_id,
            NotificationType::for_request(request.request_type),
            title,
            message,
        )
        .with_business(request.business_id)
        .with_reference(request.id)
        .with_data(json!({
            "requestId": request.id,
            "requestType": request.request_type,
            "entityId": request.entity_id,
            "payload": request.payload,
            "expiresAt": request.expires_at,
        }))
        .requiring_action()
    }

    /// 会员卡开通通知
    pub fn card_activated(card: &Card, program_name: &str) -> NewNotification {
        NewNotification::new(
            card.customer_id,
            NotificationType::CardActivated,
            "会员卡已开通",
            format!("您已加入「{program_name}」"),
        )
        .with_business(card.business_id)
        .with_reference(card.id)
        .with_data(json!({ "cardId": card.id, "programId": card.program_id }))
    }
}

/// 审批结果在指标中的标签
pub(crate) fn outcome_label(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Declined => "declined",
        ApprovalStatus::Expired => "expired",
        ApprovalStatus::Pending => "pending",
    }
}
