//! 积分发放服务
//!
//! 处理积分发放与扣减的核心业务逻辑，包括：
//! - 参数与商家归属校验
//! - 幂等处理（transaction_ref 重放）
//! - 会员卡的获取或创建
//! - 账本落账
//! - 到账通知（失败不影响主流程）
//!
//! ## 发放流程
//!
//! 1. 积分校验 -> 2. 会员计划校验 -> 3. 顾客校验 -> 4. 重放检查
//!    -> 5. 获取或创建会员卡 -> 6. 落账 -> 7. 通知

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use tracing::{info, instrument, warn};

use loyalty_shared::observability::metrics;

use crate::error::{LoyaltyError, Result};
use crate::models::{
    AppliedTransaction, Card, LedgerEntry, PLACEHOLDER_CUSTOMER_NAME, Program, Transaction,
    TransactionKind,
};
use crate::notification::{NotificationBuilder, NotificationFanout};
use crate::repository::{DirectoryRepository, LedgerStore};
use crate::service::dto::{
    APPROVAL_REF_PREFIX, AwardPointsRequest, AwardResult, DEFAULT_AWARD_SOURCE,
    DeductPointsRequest,
};

/// 积分发放服务
pub struct AwardService {
    ledger: Arc<dyn LedgerStore>,
    directory: Arc<dyn DirectoryRepository>,
    fanout: Arc<NotificationFanout>,
}

impl AwardService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        directory: Arc<dyn DirectoryRepository>,
        fanout: Arc<NotificationFanout>,
    ) -> Self {
        Self {
            ledger,
            directory,
            fanout,
        }
    }

    /// 生成 transaction_ref，格式为 `txn-{毫秒时间戳}-{随机串}`
    pub fn generate_transaction_ref() -> String {
        let suffix: u32 = rand::rng().random();
        format!("txn-{}-{:08x}", Utc::now().timestamp_millis(), suffix)
    }

    /// 向顾客发放积分
    ///
    /// 相同 transaction_ref 的重复调用返回原结果（`replayed = true`），不会重复入账或通知。
    #[instrument(skip(self, request), fields(
        business_id = request.business_id,
        customer_id = request.customer_id,
        program_id = request.program_id,
        points = request.points
    ))]
    pub async fn award_points(&self, request: AwardPointsRequest) -> Result<AwardResult> {
        let started = Instant::now();
        let source = request
            .source
            .clone()
            .unwrap_or_else(|| DEFAULT_AWARD_SOURCE.to_string());

        let result = self.award_points_inner(request, &source).await;

        let outcome = match &result {
            Ok(r) if r.replayed => "replayed",
            Ok(_) => "applied",
            Err(_) => "rejected",
        };
        metrics::record_points_award(&source, outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn award_points_inner(
        &self,
        request: AwardPointsRequest,
        source: &str,
    ) -> Result<AwardResult> {
        if request.points <= 0 {
            return Err(LoyaltyError::Validation(format!(
                "积分必须为正整数: {}",
                request.points
            )));
        }

        let program = self
            .owned_program(request.business_id, request.program_id)
            .await?;
        let customer_name = self.customer_name(request.customer_id).await?;

        let transaction_ref = match request.transaction_ref {
            Some(r) if r.starts_with(APPROVAL_REF_PREFIX) => {
                return Err(LoyaltyError::Validation(format!(
                    "transaction_ref 不能以保留前缀 {APPROVAL_REF_PREFIX} 开头"
                )));
            }
            Some(r) if !r.trim().is_empty() => r,
            _ => Self::generate_transaction_ref(),
        };

        if let Some(original) = self
            .find_replay(request.business_id, &transaction_ref)
            .await?
        {
            ensure_replay_matches(
                &original,
                TransactionKind::Credit,
                request.points,
                original.customer_id == request.customer_id
                    && original.program_id == request.program_id,
            )?;
            return self.replayed(&original).await;
        }

        let card = self
            .ledger
            .get_or_create_card(request.customer_id, program.id, program.business_id)
            .await?;
        if !card.is_active() {
            return Err(LoyaltyError::CardInactive(card.id));
        }

        let entry = LedgerEntry::credit(card.id, request.points, transaction_ref)
            .with_source(source)
            .with_description(request.description);
        let applied = self.ledger.apply_transaction(&entry).await?;
        metrics::record_ledger_transaction(TransactionKind::Credit.as_str(), applied.replayed);
        if applied.replayed {
            ensure_replay_matches(
                &applied.transaction,
                TransactionKind::Credit,
                request.points,
                applied.transaction.card_id == card.id,
            )?;
        } else {
            info!(
                card_id = card.id,
                transaction_id = applied.transaction.id,
                new_balance = applied.new_balance,
                "积分发放成功"
            );
            self.notify_points_added(&card, &program, &customer_name, &applied)
                .await;
        }

        Ok(AwardResult::from_transaction(
            &applied.transaction,
            applied.new_balance,
            applied.replayed,
        ))
    }

    /// 从会员卡扣减积分
    ///
    /// 余额不足时返回 `InsufficientBalance`，不产生任何写入。
    #[instrument(skip(self, request), fields(
        business_id = request.business_id,
        card_id = request.card_id,
        points = request.points,
        transaction_ref = %request.transaction_ref
    ))]
    pub async fn deduct_points(&self, request: DeductPointsRequest) -> Result<AwardResult> {
        if request.points <= 0 {
            return Err(LoyaltyError::Validation(format!(
                "积分必须为正整数: {}",
                request.points
            )));
        }

        let card = self
            .ledger
            .get_card(request.card_id)
            .await?
            .ok_or(LoyaltyError::CardNotFound(request.card_id))?;
        if card.business_id != request.business_id {
            return Err(LoyaltyError::Forbidden(format!(
                "会员卡 {} 不属于商家 {}",
                card.id, request.business_id
            )));
        }

        if let Some(original) = self
            .find_replay(request.business_id, &request.transaction_ref)
            .await?
        {
            ensure_replay_matches(
                &original,
                TransactionKind::Debit,
                request.points,
                original.card_id == card.id,
            )?;
            return self.replayed(&original).await;
        }

        if !card.is_active() {
            return Err(LoyaltyError::CardInactive(card.id));
        }

        let entry = LedgerEntry::debit(card.id, request.points, request.transaction_ref)
            .with_source(request.source)
            .with_description(request.description);
        let applied = self.ledger.apply_transaction(&entry).await?;
        metrics::record_ledger_transaction(TransactionKind::Debit.as_str(), applied.replayed);
        if applied.replayed {
            ensure_replay_matches(
                &applied.transaction,
                TransactionKind::Debit,
                request.points,
                applied.transaction.card_id == card.id,
            )?;
        } else {
            info!(
                transaction_id = applied.transaction.id,
                new_balance = applied.new_balance,
                "积分扣减成功"
            );
            let notification = NotificationBuilder::points_deducted(
                &card,
                applied.transaction.amount,
                applied.new_balance,
                applied.transaction.id,
            );
            if let Err(e) = self.fanout.publish(notification).await {
                warn!(card_id = card.id, error = %e, "扣减通知发送失败");
            }
        }

        Ok(AwardResult::from_transaction(
            &applied.transaction,
            applied.new_balance,
            applied.replayed,
        ))
    }

    /// 校验会员计划存在、属于该商家且处于启用状态
    async fn owned_program(&self, business_id: i64, program_id: i64) -> Result<Program> {
        let program = self
            .directory
            .get_program(program_id)
            .await?
            .ok_or(LoyaltyError::ProgramNotFound(program_id))?;

        if program.business_id != business_id {
            return Err(LoyaltyError::Forbidden(format!(
                "会员计划 {program_id} 不属于商家 {business_id}"
            )));
        }
        if !program.active {
            return Err(LoyaltyError::ProgramInactive(program_id));
        }
        Ok(program)
    }

    /// 解析顾客称呼
    ///
    /// 顾客不存在时报错；查询本身暂时失败时使用占位称呼继续发放。
    async fn customer_name(&self, customer_id: i64) -> Result<String> {
        if customer_id <= 0 {
            return Err(LoyaltyError::Validation(format!(
                "顾客 id 无效: {customer_id}"
            )));
        }

        match self.directory.get_customer(customer_id).await {
            Ok(Some(customer)) => Ok(customer.display_name),
            Ok(None) => Err(LoyaltyError::CustomerNotFound(customer_id)),
            Err(e) if e.is_retryable() => {
                warn!(customer_id, error = %e, "顾客查询失败，使用占位称呼");
                Ok(PLACEHOLDER_CUSTOMER_NAME.to_string())
            }
            Err(e) => Err(e),
        }
    }

    async fn find_replay(
        &self,
        business_id: i64,
        transaction_ref: &str,
    ) -> Result<Option<Transaction>> {
        self.ledger
            .find_transaction_by_ref(business_id, transaction_ref)
            .await
    }

    /// 已落账的流水按重放返回，余额取会员卡当前值
    async fn replayed(&self, transaction: &Transaction) -> Result<AwardResult> {
        let balance = self.current_balance(transaction).await?;
        metrics::record_ledger_transaction(transaction.kind.as_str(), true);
        info!(
            transaction_id = transaction.id,
            transaction_ref = %transaction.transaction_ref,
            "transaction_ref 已落账，按重放返回"
        );
        Ok(AwardResult::from_transaction(transaction, balance, true))
    }

    async fn current_balance(&self, transaction: &Transaction) -> Result<i64> {
        Ok(self
            .ledger
            .get_card(transaction.card_id)
            .await?
            .map(|c| c.balance)
            .unwrap_or(transaction.balance_after))
    }

    async fn notify_points_added(
        &self,
        card: &Card,
        program: &Program,
        customer_name: &str,
        applied: &AppliedTransaction,
    ) {
        let notification = NotificationBuilder::points_added(
            card,
            &program.name,
            customer_name,
            applied.transaction.amount,
            applied.new_balance,
            applied.transaction.id,
        );
        if let Err(e) = self.fanout.publish(notification).await {
            warn!(card_id = card.id, error = %e, "到账通知发送失败");
        }
    }
}

/// 同一 transaction_ref 只能对应同一笔操作
fn ensure_replay_matches(
    original: &Transaction,
    kind: TransactionKind,
    amount: i64,
    same_target: bool,
) -> Result<()> {
    if original.kind == kind && original.amount == amount && same_target {
        return Ok(());
    }
    warn!(
        transaction_ref = %original.transaction_ref,
        original_id = original.id,
        "重复的 transaction_ref 携带了不同参数"
    );
    Err(LoyaltyError::TransactionRefConflict(
        original.transaction_ref.clone(),
    ))
}
