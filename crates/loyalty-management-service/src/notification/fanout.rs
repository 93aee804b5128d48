//! 通知分发
//!
//! 通知总是先落库，再按顾客的推送偏好决定是否实时推送。
//! 推送是尽力而为的：失败只记日志，不影响发起方。

use std::sync::Arc;

use chrono::Utc;
use loyalty_shared::observability::metrics;
use tracing::{debug, instrument, warn};

use super::hub::{RealtimeHub, Subscription};
use super::types::FanoutEvent;
use crate::error::{LoyaltyError, Result};
use crate::models::{NewNotification, Notification, NotificationPreferences, NotificationType};
use crate::repository::{NotificationRepository, PreferenceRepository};

/// 通知分发服务
pub struct NotificationFanout {
    notifications: Arc<dyn NotificationRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    hub: Arc<RealtimeHub>,
}

impl NotificationFanout {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        hub: Arc<RealtimeHub>,
    ) -> Self {
        Self {
            notifications,
            preferences,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.hub
    }

    /// 为顾客的一个设备会话登记实时订阅
    pub fn subscribe(&self, customer_id: i64) -> Subscription {
        self.hub.subscribe(customer_id)
    }

    /// 持久化通知并尝试实时推送
    #[instrument(skip(self, notification), fields(
        customer_id = notification.customer_id,
        notification_type = notification.notification_type.as_str()
    ))]
    pub async fn publish(&self, notification: NewNotification) -> Result<Notification> {
        let created = self.notifications.create(&notification).await?;
        self.push(&created).await;
        Ok(created)
    }

    /// 对已持久化的通知做实时推送，受推送偏好约束
    pub async fn push(&self, notification: &Notification) -> usize {
        if !self
            .push_allowed(notification.customer_id, notification.notification_type)
            .await
        {
            debug!(
                customer_id = notification.customer_id,
                notification_id = notification.id,
                "推送类型已被静音，仅落库"
            );
            return 0;
        }
        self.emit(notification.customer_id, FanoutEvent::from_notification(notification))
    }

    /// 向顾客的在线会话推送事件，不阻塞、不失败
    pub fn emit(&self, customer_id: i64, event: FanoutEvent) -> usize {
        let delivered = self.hub.emit(customer_id, &event);
        metrics::record_fanout_event(event.event_type.as_str(), delivered);
        debug!(
            customer_id,
            event_type = event.event_type.as_str(),
            delivered,
            "实时事件已分发"
        );
        delivered
    }

    async fn push_allowed(&self, customer_id: i64, notification_type: NotificationType) -> bool {
        match self.preferences.get(customer_id).await {
            Ok(Some(prefs)) => prefs.allows_push(notification_type),
            Ok(None) => true,
            Err(e) => {
                // 偏好读取失败时按默认偏好推送
                warn!(customer_id, error = %e, "读取推送偏好失败");
                true
            }
        }
    }

    pub async fn list(&self, customer_id: i64, limit: i64) -> Result<Vec<Notification>> {
        self.notifications.list_by_customer(customer_id, limit).await
    }

    pub async fn list_unread(&self, customer_id: i64) -> Result<Vec<Notification>> {
        self.notifications.list_unread(customer_id).await
    }

    /// 未读或尚未处理的通知，按时间倒序
    pub async fn list_pending(&self, customer_id: i64) -> Result<Vec<Notification>> {
        self.notifications.list_pending(customer_id).await
    }

    /// 标记已读，只能操作自己的通知
    pub async fn mark_read(&self, customer_id: i64, notification_id: i64) -> Result<Notification> {
        self.ensure_owned(customer_id, notification_id).await?;
        self.notifications
            .mark_read(notification_id)
            .await?
            .ok_or(LoyaltyError::NotificationNotFound(notification_id))
    }

    /// 审批处理后调用，不校验归属
    pub async fn mark_action_taken(&self, notification_id: i64) -> Result<Notification> {
        self.notifications
            .mark_action_taken(notification_id)
            .await?
            .ok_or(LoyaltyError::NotificationNotFound(notification_id))
    }

    pub async fn mark_all_read(&self, customer_id: i64) -> Result<u64> {
        self.notifications.mark_all_read(customer_id).await
    }

    pub async fn get_preferences(&self, customer_id: i64) -> Result<NotificationPreferences> {
        Ok(self
            .preferences
            .get(customer_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults(customer_id)))
    }

    pub async fn update_preferences(
        &self,
        customer_id: i64,
        mut muted_types: Vec<NotificationType>,
    ) -> Result<NotificationPreferences> {
        muted_types.sort_by_key(|t| t.as_str());
        muted_types.dedup();

        let preferences = NotificationPreferences {
            customer_id,
            muted_types,
            updated_at: Utc::now(),
        };
        self.preferences.upsert(&preferences).await
    }

    /// 其他顾客的通知按不存在处理，不暴露 id 是否存在
    async fn ensure_owned(&self, customer_id: i64, notification_id: i64) -> Result<()> {
        match self.notifications.get(notification_id).await? {
            Some(n) if n.customer_id == customer_id => Ok(()),
            _ => Err(LoyaltyError::NotificationNotFound(notification_id)),
        }
    }
}
