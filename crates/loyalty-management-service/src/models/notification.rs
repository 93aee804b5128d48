//! 通知与通知偏好实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::NotificationType;

/// 站内通知
///
/// 需要处理的通知（requires_action）在处理前一直出现在待办列表中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub customer_id: i64,
    #[sqlx(default)]
    pub business_id: Option<i64>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    /// 关联实体，如审批请求 id 或会员卡 id
    #[sqlx(default)]
    pub reference_id: Option<i64>,
    pub requires_action: bool,
    pub action_taken: bool,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// 是否仍在待办列表中
    pub fn is_pending(&self) -> bool {
        !self.is_read || (self.requires_action && !self.action_taken)
    }
}

/// 待创建的通知
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub customer_id: i64,
    pub business_id: Option<i64>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub reference_id: Option<i64>,
    pub requires_action: bool,
}

impl NewNotification {
    pub fn new(
        customer_id: i64,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            business_id: None,
            notification_type,
            title: title.into(),
            message: message.into(),
            data: serde_json::Value::Object(Default::default()),
            reference_id: None,
            requires_action: false,
        }
    }

    pub fn with_business(mut self, business_id: i64) -> Self {
        self.business_id = Some(business_id);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_reference(mut self, reference_id: i64) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn requiring_action(mut self) -> Self {
        self.requires_action = true;
        self
    }
}

/// 顾客的推送偏好
///
/// 被静音的类型仍然落库，只是不做实时推送。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub customer_id: i64,
    pub muted_types: Vec<NotificationType>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreferences {
    pub fn defaults(customer_id: i64) -> Self {
        Self {
            customer_id,
            muted_types: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// 是否允许实时推送该类型
    pub fn allows_push(&self, notification_type: NotificationType) -> bool {
        !self.muted_types.contains(&notification_type)
    }
}
