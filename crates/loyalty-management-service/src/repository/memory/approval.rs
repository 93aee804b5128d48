//! 内存审批请求仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Table;
use crate::error::Result;
use crate::models::{ApprovalRequest, ApprovalStatus, NewApprovalRequest};
use crate::repository::ApprovalRepository;

/// 内存审批请求仓储
///
/// 状态迁移在 DashMap 行锁内做条件判断，与 `UPDATE ... WHERE status = 'PENDING'` 等价。
#[derive(Default)]
pub struct MemoryApprovalRepository {
    requests: Table<ApprovalRequest>,
}

impl MemoryApprovalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRepository for MemoryApprovalRepository {
    async fn create(&self, request: &NewApprovalRequest) -> Result<ApprovalRequest> {
        let created = ApprovalRequest {
            id: self.requests.next_id(),
            customer_id: request.customer_id,
            business_id: request.business_id,
            request_type: request.request_type,
            entity_id: request.entity_id,
            payload: request.payload.clone(),
            status: ApprovalStatus::Pending,
            notification_id: None,
            result_card_id: None,
            expires_at: request.expires_at,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.requests.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<ApprovalRequest>> {
        Ok(self.requests.get(id))
    }

    async fn list_by_customer(
        &self,
        customer_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>> {
        let mut requests = self.requests.list_by(|r| {
            r.customer_id == customer_id && status.is_none_or(|s| r.status == s)
        });
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn link_notification(&self, id: i64, notification_id: i64) -> Result<()> {
        self.requests
            .update(id, |r| r.notification_id = Some(notification_id));
        Ok(())
    }

    async fn resolve(
        &self,
        id: i64,
        status: ApprovalStatus,
        result_card_id: Option<i64>,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<ApprovalRequest>> {
        Ok(self.requests.update_if(
            id,
            |r| r.status == ApprovalStatus::Pending,
            |r| {
                r.status = status;
                r.result_card_id = result_card_id;
                r.resolved_at = Some(resolved_at);
            },
        ))
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ApprovalRequest>> {
        let mut overdue = self.requests.list_by(|r| r.is_overdue(now));
        overdue.sort_by_key(|r| (r.expires_at, r.id));
        overdue.truncate(limit.max(0) as usize);
        Ok(overdue)
    }

    async fn expire(&self, id: i64, now: DateTime<Utc>) -> Result<Option<ApprovalRequest>> {
        Ok(self.requests.update_if(
            id,
            |r| r.is_overdue(now),
            |r| {
                r.status = ApprovalStatus::Expired;
                r.resolved_at = Some(now);
            },
        ))
    }
}
