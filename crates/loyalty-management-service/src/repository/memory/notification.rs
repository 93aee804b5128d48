//! 内存通知与推送偏好仓储

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::Table;
use crate::error::Result;
use crate::models::{NewNotification, Notification, NotificationPreferences};
use crate::repository::{NotificationRepository, PreferenceRepository};

/// 内存通知仓储
#[derive(Default)]
pub struct MemoryNotificationRepository {
    notifications: Table<Notification>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut list: Vec<Notification>) -> Vec<Notification> {
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let created = Notification {
            id: self.notifications.next_id(),
            customer_id: notification.customer_id,
            business_id: notification.business_id,
            notification_type: notification.notification_type,
            title: notification.title.clone(),
            message: notification.message.clone(),
            data: notification.data.clone(),
            reference_id: notification.reference_id,
            requires_action: notification.requires_action,
            action_taken: false,
            is_read: false,
            created_at: Utc::now(),
        };
        self.notifications.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.notifications.get(id))
    }

    async fn list_by_customer(&self, customer_id: i64, limit: i64) -> Result<Vec<Notification>> {
        let mut list =
            Self::newest_first(self.notifications.list_by(|n| n.customer_id == customer_id));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn list_unread(&self, customer_id: i64) -> Result<Vec<Notification>> {
        Ok(Self::newest_first(
            self.notifications
                .list_by(|n| n.customer_id == customer_id && !n.is_read),
        ))
    }

    async fn list_pending(&self, customer_id: i64) -> Result<Vec<Notification>> {
        Ok(Self::newest_first(
            self.notifications
                .list_by(|n| n.customer_id == customer_id && n.is_pending()),
        ))
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.notifications.update(id, |n| n.is_read = true))
    }

    async fn mark_action_taken(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.notifications.update(id, |n| {
            n.action_taken = true;
            n.is_read = true;
        }))
    }

    async fn mark_all_read(&self, customer_id: i64) -> Result<u64> {
        let unread = self
            .notifications
            .list_by(|n| n.customer_id == customer_id && !n.is_read);
        let mut count = 0;
        for n in unread {
            if self
                .notifications
                .update_if(n.id, |current| !current.is_read, |current| current.is_read = true)
                .is_some()
            {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// 内存推送偏好仓储
#[derive(Default)]
pub struct MemoryPreferenceRepository {
    preferences: DashMap<i64, NotificationPreferences>,
}

impl MemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceRepository for MemoryPreferenceRepository {
    async fn get(&self, customer_id: i64) -> Result<Option<NotificationPreferences>> {
        Ok(self.preferences.get(&customer_id).map(|p| p.clone()))
    }

    async fn upsert(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        let stored = NotificationPreferences {
            updated_at: Utc::now(),
            ..preferences.clone()
        };
        self.preferences.insert(stored.customer_id, stored.clone());
        Ok(stored)
    }
}
