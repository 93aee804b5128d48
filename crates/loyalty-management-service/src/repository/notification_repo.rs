//! 通知与推送偏好仓储（PostgreSQL）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use super::traits::{NotificationRepository, PreferenceRepository};
use crate::error::Result;
use crate::models::{NewNotification, Notification, NotificationPreferences, NotificationType};

const NOTIFICATION_COLUMNS: &str = "id, customer_id, business_id, notification_type, title, message, \
     data, reference_id, requires_action, action_taken, is_read, created_at";

/// 通知仓储
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn update_one(&self, sql: &str, id: i64) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notification)
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let created = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications
                (customer_id, business_id, notification_type, title, message, data,
                 reference_id, requires_action, action_taken, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, FALSE, NOW())
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification.customer_id)
        .bind(notification.business_id)
        .bind(notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .bind(notification.reference_id)
        .bind(notification.requires_action)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn list_by_customer(&self, customer_id: i64, limit: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE customer_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn list_unread(&self, customer_id: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE customer_id = $1 AND NOT is_read ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn list_pending(&self, customer_id: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE customer_id = $1
              AND (NOT is_read OR (requires_action AND NOT action_taken))
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>> {
        self.update_one(
            &format!(
                "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
            ),
            id,
        )
        .await
    }

    async fn mark_action_taken(&self, id: i64) -> Result<Option<Notification>> {
        self.update_one(
            &format!(
                "UPDATE notifications SET action_taken = TRUE, is_read = TRUE \
                 WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
            ),
            id,
        )
        .await
    }

    async fn mark_all_read(&self, customer_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE customer_id = $1 AND NOT is_read",
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// 推送偏好仓储
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    customer_id: i64,
    muted_types: Json<Vec<NotificationType>>,
    updated_at: DateTime<Utc>,
}

impl From<PreferenceRow> for NotificationPreferences {
    fn from(row: PreferenceRow) -> Self {
        Self {
            customer_id: row.customer_id,
            muted_types: row.muted_types.0,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn get(&self, customer_id: i64) -> Result<Option<NotificationPreferences>> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            "SELECT customer_id, muted_types, updated_at FROM notification_preferences \
             WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            INSERT INTO notification_preferences (customer_id, muted_types, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (customer_id)
            DO UPDATE SET muted_types = EXCLUDED.muted_types, updated_at = NOW()
            RETURNING customer_id, muted_types, updated_at
            "#,
        )
        .bind(preferences.customer_id)
        .bind(Json(&preferences.muted_types))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
