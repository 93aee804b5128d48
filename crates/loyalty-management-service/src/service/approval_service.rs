//! 审批服务
//!
//! 商家发起、顾客处理的待确认操作（加入会员计划、扣减积分）。
//!
//! ## 处理流程
//!
//! 1. 按请求加锁 -> 2. 归属与状态检查 -> 3. 执行副作用（幂等）
//!    -> 4. 条件迁移状态（仅从 PENDING） -> 5. 标记通知已处理并推送结果
//!
//! 副作用以请求为键做幂等：入会是 get-or-create，扣减使用 `approval-{id}`
//! 作为 transaction_ref。副作用成功但状态迁移前崩溃时，下一次处理会重放副作用后完成迁移。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use loyalty_shared::observability::metrics;

use crate::error::{LoyaltyError, Result};
use crate::lock::KeyedLock;
use crate::models::{
    ApprovalRequest, ApprovalRequestType, ApprovalStatus, CardStatus, DEFAULT_APPROVAL_TTL_DAYS,
    NewApprovalRequest, expiry_from,
};
use crate::notification::types::outcome_label;
use crate::notification::{FanoutEvent, NotificationBuilder, NotificationFanout};
use crate::repository::{ApprovalRepository, DirectoryRepository, LedgerStore};
use crate::service::award_service::AwardService;
use crate::service::dto::{
    APPROVAL_SOURCE, ApprovalResolution, CreateApprovalRequest, DeductPointsRequest,
    approval_transaction_ref,
};

/// 审批服务
pub struct ApprovalService {
    approvals: Arc<dyn ApprovalRepository>,
    ledger: Arc<dyn LedgerStore>,
    directory: Arc<dyn DirectoryRepository>,
    awards: Arc<AwardService>,
    fanout: Arc<NotificationFanout>,
    locks: KeyedLock<i64>,
    default_ttl: Duration,
}

/// 副作用的结果
struct SideEffect {
    card_id: i64,
    /// 入会批准时需要发送开卡通知
    activated_program: Option<String>,
}

impl ApprovalService {
    pub fn new(
        approvals: Arc<dyn ApprovalRepository>,
        ledger: Arc<dyn LedgerStore>,
        directory: Arc<dyn DirectoryRepository>,
        awards: Arc<AwardService>,
        fanout: Arc<NotificationFanout>,
    ) -> Self {
        Self {
            approvals,
            ledger,
            directory,
            awards,
            fanout,
            locks: KeyedLock::new(),
            default_ttl: Duration::days(DEFAULT_APPROVAL_TTL_DAYS),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// 创建审批请求并通知顾客
    #[instrument(skip(self, request), fields(
        customer_id = request.customer_id,
        business_id = request.business_id,
        request_type = request.request_type.as_str(),
        entity_id = request.entity_id
    ))]
    pub async fn create_approval_request(
        &self,
        request: CreateApprovalRequest,
    ) -> Result<ApprovalRequest> {
        if request.customer_id <= 0 {
            return Err(LoyaltyError::Validation(format!(
                "顾客 id 无效: {}",
                request.customer_id
            )));
        }
        let ttl = request.ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(LoyaltyError::Validation("有效期必须为正".into()));
        }

        self.ensure_customer(request.customer_id).await?;
        let subject = match request.request_type {
            ApprovalRequestType::Enrollment => self.check_enrollment(&request).await?,
            ApprovalRequestType::PointsDeduction => self.check_deduction(&request).await?,
        };

        let mut created = self
            .approvals
            .create(&NewApprovalRequest {
                customer_id: request.customer_id,
                business_id: request.business_id,
                request_type: request.request_type,
                entity_id: request.entity_id,
                payload: request.payload,
                expires_at: expiry_from(Utc::now(), Some(ttl)),
            })
            .await?;

        info!(request_id = created.id, expires_at = %created.expires_at, "审批请求已创建");

        // 通知失败不回滚请求，顾客仍可在待办审批列表中看到
        match self
            .fanout
            .publish(NotificationBuilder::approval_request(&created, &subject))
            .await
        {
            Ok(notification) => {
                match self
                    .approvals
                    .link_notification(created.id, notification.id)
                    .await
                {
                    Ok(()) => created.notification_id = Some(notification.id),
                    Err(e) => warn!(request_id = created.id, error = %e, "关联审批通知失败"),
                }
            }
            Err(e) => warn!(request_id = created.id, error = %e, "审批通知发送失败"),
        }

        Ok(created)
    }

    /// 顾客处理审批请求
    ///
    /// - 相同结果的重复处理返回原结果
    /// - 与已有结果冲突时返回 `AlreadyResolved`
    /// - 已过期的请求返回 `RequestExpired`
    /// - 副作用失败时请求保持 PENDING
    #[instrument(skip(self))]
    pub async fn respond_to_approval(
        &self,
        request_id: i64,
        customer_id: i64,
        approved: bool,
    ) -> Result<ApprovalResolution> {
        let _guard = self.locks.lock(request_id).await;

        let request = self
            .approvals
            .get(request_id)
            .await?
            .ok_or(LoyaltyError::RequestNotFound(request_id))?;
        if request.customer_id != customer_id {
            return Err(LoyaltyError::Forbidden(format!(
                "审批请求 {request_id} 不属于顾客 {customer_id}"
            )));
        }

        let target = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Declined
        };
        let now = Utc::now();

        if request.is_overdue(now) {
            self.expire_one(&request, now).await;
            return Err(LoyaltyError::RequestExpired(request_id));
        }
        if request.status.is_terminal() {
            return Self::settled(request, target);
        }

        let effect = if approved {
            Some(self.apply_side_effect(&request).await.map_err(|e| {
                if e.is_retryable() {
                    LoyaltyError::DependencyUnavailable(format!(
                        "审批请求 {request_id} 的副作用执行失败: {e}"
                    ))
                } else {
                    e
                }
            })?)
        } else {
            None
        };
        let card_id = effect.as_ref().map(|e| e.card_id);

        let Some(resolved) = self
            .approvals
            .resolve(request_id, target, card_id, now)
            .await?
        else {
            // 其他实例抢先完成了迁移
            let current = self
                .approvals
                .get(request_id)
                .await?
                .ok_or(LoyaltyError::RequestNotFound(request_id))?;
            return Self::settled(current, target);
        };

        metrics::record_approval_resolution(
            resolved.request_type.as_str(),
            outcome_label(resolved.status),
        );
        info!(status = resolved.status.as_str(), ?card_id, "审批请求已处理");

        if let Some(SideEffect {
            card_id,
            activated_program: Some(program_name),
        }) = &effect
        {
            self.notify_card_activated(*card_id, program_name).await;
        }
        self.finish(&resolved).await;

        Ok(ApprovalResolution {
            request: resolved,
            card_id,
            replayed: false,
        })
    }

    /// 按有效状态返回单个请求
    pub async fn get_request(&self, request_id: i64) -> Result<ApprovalRequest> {
        self.approvals
            .get(request_id)
            .await?
            .map(|r| r.with_effective_status(Utc::now()))
            .ok_or(LoyaltyError::RequestNotFound(request_id))
    }

    /// 顾客尚未处理且未过期的请求，按创建时间倒序
    pub async fn list_pending(&self, customer_id: i64) -> Result<Vec<ApprovalRequest>> {
        let now = Utc::now();
        Ok(self
            .approvals
            .list_by_customer(customer_id, Some(ApprovalStatus::Pending))
            .await?
            .into_iter()
            .filter(|r| !r.is_overdue(now))
            .collect())
    }

    /// 批量持久化过期状态，返回本次标记的数量
    ///
    /// 读取路径按有效状态判断，不依赖本方法。每个请求在与顾客处理相同的锁内迁移，
    /// 处理中的请求等处理结束后再判断，已完成的副作用不会被过期覆盖。
    #[instrument(skip(self))]
    pub async fn expire_overdue(&self, limit: i64) -> Result<usize> {
        let now = Utc::now();
        let candidates = self.approvals.list_overdue(now, limit).await?;

        let mut expired = 0;
        for candidate in candidates {
            let _guard = self.locks.lock(candidate.id).await;
            let Some(request) = self.approvals.expire(candidate.id, now).await? else {
                continue;
            };
            metrics::record_approval_resolution(
                request.request_type.as_str(),
                outcome_label(request.status),
            );
            self.finish(&request).await;
            expired += 1;
        }
        metrics::record_approvals_expired(expired as u64);
        Ok(expired)
    }

    /// 终态请求的重复处理
    fn settled(request: ApprovalRequest, target: ApprovalStatus) -> Result<ApprovalResolution> {
        match request.status {
            ApprovalStatus::Expired => Err(LoyaltyError::RequestExpired(request.id)),
            status if status == target => Ok(ApprovalResolution {
                card_id: request.result_card_id,
                request,
                replayed: true,
            }),
            status => Err(LoyaltyError::AlreadyResolved {
                request_id: request.id,
                status,
            }),
        }
    }

    async fn apply_side_effect(&self, request: &ApprovalRequest) -> Result<SideEffect> {
        match request.request_type {
            ApprovalRequestType::Enrollment => {
                let program = self
                    .directory
                    .get_program(request.entity_id)
                    .await?
                    .ok_or(LoyaltyError::ProgramNotFound(request.entity_id))?;
                if !program.active {
                    return Err(LoyaltyError::ProgramInactive(program.id));
                }

                let mut card = self
                    .ledger
                    .get_or_create_card(request.customer_id, program.id, program.business_id)
                    .await?;
                if !card.is_active() {
                    card = self
                        .ledger
                        .set_card_status(card.id, CardStatus::Active)
                        .await?;
                }

                Ok(SideEffect {
                    card_id: card.id,
                    activated_program: Some(program.name),
                })
            }
            ApprovalRequestType::PointsDeduction => {
                let points = request.requested_points().ok_or_else(|| {
                    LoyaltyError::Validation(format!("审批请求 {} 缺少扣减积分", request.id))
                })?;

                let result = self
                    .awards
                    .deduct_points(DeductPointsRequest {
                        business_id: request.business_id,
                        card_id: request.entity_id,
                        points,
                        source: APPROVAL_SOURCE.to_string(),
                        description: Some(format!("审批请求 {}", request.id)),
                        transaction_ref: approval_transaction_ref(request.id),
                    })
                    .await?;

                Ok(SideEffect {
                    card_id: result.card_id,
                    activated_program: None,
                })
            }
        }
    }

    /// 状态迁移后的收尾：待办通知标记已处理，推送结果事件
    async fn finish(&self, request: &ApprovalRequest) {
        if let Some(notification_id) = request.notification_id
            && let Err(e) = self.fanout.mark_action_taken(notification_id).await
        {
            warn!(request_id = request.id, notification_id, error = %e, "标记通知已处理失败");
        }
        self.fanout
            .emit(request.customer_id, FanoutEvent::approval_resolved(request));
    }

    /// 处理时发现已过期：尽力持久化，失败交给过期扫描
    async fn expire_one(&self, request: &ApprovalRequest, now: DateTime<Utc>) {
        match self.approvals.expire(request.id, now).await {
            Ok(Some(expired)) => {
                metrics::record_approval_resolution(
                    expired.request_type.as_str(),
                    outcome_label(expired.status),
                );
                self.finish(&expired).await;
            }
            Ok(None) => {}
            Err(e) => warn!(request_id = request.id, error = %e, "持久化过期状态失败"),
        }
    }

    async fn notify_card_activated(&self, card_id: i64, program_name: &str) {
        let card = match self.ledger.get_card(card_id).await {
            Ok(Some(card)) => card,
            Ok(None) => return,
            Err(e) => {
                warn!(card_id, error = %e, "读取会员卡失败，跳过开卡通知");
                return;
            }
        };
        if let Err(e) = self
            .fanout
            .publish(NotificationBuilder::card_activated(&card, program_name))
            .await
        {
            warn!(card_id, error = %e, "开卡通知发送失败");
        }
    }

    async fn ensure_customer(&self, customer_id: i64) -> Result<()> {
        match self.directory.get_customer(customer_id).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(LoyaltyError::CustomerNotFound(customer_id)),
            Err(e) if e.is_retryable() => {
                warn!(customer_id, error = %e, "顾客查询失败，跳过存在性校验");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 入会请求：entity_id 为本商家的启用计划，返回计划名
    async fn check_enrollment(&self, request: &CreateApprovalRequest) -> Result<String> {
        let program = self
            .directory
            .get_program(request.entity_id)
            .await?
            .ok_or(LoyaltyError::ProgramNotFound(request.entity_id))?;
        if program.business_id != request.business_id {
            return Err(LoyaltyError::Forbidden(format!(
                "会员计划 {} 不属于商家 {}",
                program.id, request.business_id
            )));
        }
        if !program.active {
            return Err(LoyaltyError::ProgramInactive(program.id));
        }
        Ok(program.name)
    }

    /// 扣减请求：entity_id 为该顾客在本商家的会员卡，payload.points 为正整数
    async fn check_deduction(&self, request: &CreateApprovalRequest) -> Result<String> {
        let points = request.payload.get("points").and_then(|v| v.as_i64());
        if !points.is_some_and(|p| p > 0) {
            return Err(LoyaltyError::Validation(
                "payload.points 必须为正整数".into(),
            ));
        }

        let card = self
            .ledger
            .get_card(request.entity_id)
            .await?
            .ok_or(LoyaltyError::CardNotFound(request.entity_id))?;
        if card.business_id != request.business_id {
            return Err(LoyaltyError::Forbidden(format!(
                "会员卡 {} 不属于商家 {}",
                card.id, request.business_id
            )));
        }
        if card.customer_id != request.customer_id {
            return Err(LoyaltyError::Validation(format!(
                "会员卡 {} 不属于顾客 {}",
                card.id, request.customer_id
            )));
        }

        Ok(self
            .directory
            .get_program(card.program_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_default())
    }
}
