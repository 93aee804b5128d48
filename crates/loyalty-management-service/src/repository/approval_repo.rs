//! 审批请求仓储（PostgreSQL）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::traits::ApprovalRepository;
use crate::error::Result;
use crate::models::{ApprovalRequest, ApprovalStatus, NewApprovalRequest};

const REQUEST_COLUMNS: &str = "id, customer_id, business_id, request_type, entity_id, payload, \
     status, notification_id, result_card_id, expires_at, created_at, resolved_at";

/// 审批请求仓储
pub struct PgApprovalRepository {
    pool: PgPool,
}

impl PgApprovalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalRepository for PgApprovalRepository {
    async fn create(&self, request: &NewApprovalRequest) -> Result<ApprovalRequest> {
        let created = sqlx::query_as::<_, ApprovalRequest>(&format!(
            r#"
            INSERT INTO approval_requests
                (customer_id, business_id, request_type, entity_id, payload, status, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(request.customer_id)
        .bind(request.business_id)
        .bind(request.request_type)
        .bind(request.entity_id)
        .bind(&request.payload)
        .bind(ApprovalStatus::Pending)
        .bind(request.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<ApprovalRequest>> {
        let request = sqlx::query_as::<_, ApprovalRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn list_by_customer(
        &self,
        customer_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>> {
        let requests = sqlx::query_as::<_, ApprovalRequest>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM approval_requests
            WHERE customer_id = $1 AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(customer_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn link_notification(&self, id: i64, notification_id: i64) -> Result<()> {
        sqlx::query("UPDATE approval_requests SET notification_id = $2 WHERE id = $1")
            .bind(id)
            .bind(notification_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn resolve(
        &self,
        id: i64,
        status: ApprovalStatus,
        result_card_id: Option<i64>,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<ApprovalRequest>> {
        let resolved = sqlx::query_as::<_, ApprovalRequest>(&format!(
            r#"
            UPDATE approval_requests
            SET status = $2, result_card_id = $3, resolved_at = $4
            WHERE id = $1 AND status = $5
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(result_card_id)
        .bind(resolved_at)
        .bind(ApprovalStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resolved)
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApprovalRequest>> {
        let overdue = sqlx::query_as::<_, ApprovalRequest>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM approval_requests
            WHERE status = $3 AND expires_at <= $1
            ORDER BY expires_at, id
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .bind(ApprovalStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(overdue)
    }

    async fn expire(&self, id: i64, now: DateTime<Utc>) -> Result<Option<ApprovalRequest>> {
        let expired = sqlx::query_as::<_, ApprovalRequest>(&format!(
            r#"
            UPDATE approval_requests
            SET status = $3, resolved_at = $2
            WHERE id = $1 AND status = $4 AND expires_at <= $2
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .bind(ApprovalStatus::Expired)
        .bind(ApprovalStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expired)
    }
}
