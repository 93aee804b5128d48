//! 积分账本仓储（PostgreSQL）
//!
//! 会员卡行锁串行化同卡落账，`(business_id, transaction_ref)` 唯一约束兜底跨卡重复提交。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::traits::LedgerStore;
use super::{next_balance, validate_entry};
use crate::error::{LoyaltyError, Result};
use crate::models::{
    AppliedTransaction, Card, CardStatus, DEFAULT_TIER, LedgerEntry, Transaction,
};

const CARD_COLUMNS: &str =
    "id, customer_id, program_id, business_id, balance, status, tier, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, card_id, customer_id, business_id, program_id, kind, amount, \
     source_tag, description, transaction_ref, balance_after, created_at";

/// 积分账本仓储
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取会员卡（带行级锁）
    pub async fn get_card_for_update(tx: &mut PgConnection, card_id: i64) -> Result<Option<Card>> {
        let card = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM loyalty_cards WHERE id = $1 FOR UPDATE"
        ))
        .bind(card_id)
        .fetch_optional(tx)
        .await?;

        Ok(card)
    }

    async fn find_by_ref_in_tx(
        tx: &mut PgConnection,
        business_id: i64,
        transaction_ref: &str,
    ) -> Result<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM loyalty_transactions \
             WHERE business_id = $1 AND transaction_ref = $2"
        ))
        .bind(business_id)
        .bind(transaction_ref)
        .fetch_optional(tx)
        .await?;

        Ok(transaction)
    }

    async fn insert_transaction_in_tx(
        tx: &mut PgConnection,
        card: &Card,
        entry: &LedgerEntry,
        balance_after: i64,
    ) -> Result<Transaction> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO loyalty_transactions
                (card_id, customer_id, business_id, program_id, kind, amount,
                 source_tag, description, transaction_ref, balance_after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(card.id)
        .bind(card.customer_id)
        .bind(card.business_id)
        .bind(card.program_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(&entry.source_tag)
        .bind(&entry.description)
        .bind(&entry.transaction_ref)
        .bind(balance_after)
        .fetch_one(tx)
        .await?;

        Ok(transaction)
    }

    async fn update_balance_in_tx(tx: &mut PgConnection, card_id: i64, balance: i64) -> Result<()> {
        sqlx::query("UPDATE loyalty_cards SET balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(card_id)
            .bind(balance)
            .execute(tx)
            .await?;

        Ok(())
    }

    /// 按已存在的流水构造重放结果
    async fn replay(&self, existing: Transaction) -> Result<AppliedTransaction> {
        let card = self
            .get_card(existing.card_id)
            .await?
            .ok_or(LoyaltyError::CardNotFound(existing.card_id))?;

        Ok(AppliedTransaction {
            transaction: existing,
            new_balance: card.balance,
            replayed: true,
        })
    }
}

fn is_unique_violation(err: &LoyaltyError) -> bool {
    matches!(err, LoyaltyError::Database(sqlx::Error::Database(db)) if db.is_unique_violation())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self))]
    async fn get_or_create_card(
        &self,
        customer_id: i64,
        program_id: i64,
        business_id: i64,
    ) -> Result<Card> {
        // 并发创建依赖 (customer_id, program_id) 唯一约束，冲突方读取已有行
        sqlx::query(
            r#"
            INSERT INTO loyalty_cards
                (customer_id, program_id, business_id, balance, status, tier, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5, NOW(), NOW())
            ON CONFLICT (customer_id, program_id) DO NOTHING
            "#,
        )
        .bind(customer_id)
        .bind(program_id)
        .bind(business_id)
        .bind(CardStatus::Active)
        .bind(DEFAULT_TIER)
        .execute(&self.pool)
        .await?;

        self.find_card(customer_id, program_id)
            .await?
            .ok_or_else(|| LoyaltyError::Storage("会员卡创建后读取失败".into()))
    }

    #[instrument(skip(self, entry), fields(card_id = entry.card_id, transaction_ref = %entry.transaction_ref))]
    async fn apply_transaction(&self, entry: &LedgerEntry) -> Result<AppliedTransaction> {
        validate_entry(entry)?;

        let mut tx = self.pool.begin().await?;

        let card = Self::get_card_for_update(&mut tx, entry.card_id)
            .await?
            .ok_or(LoyaltyError::CardNotFound(entry.card_id))?;

        if let Some(existing) =
            Self::find_by_ref_in_tx(&mut tx, card.business_id, &entry.transaction_ref).await?
        {
            tx.rollback().await?;
            debug!(transaction_id = existing.id, "transaction_ref 已存在，按重放处理");
            return self.replay(existing).await;
        }

        let new_balance = next_balance(&card, entry)?;

        let transaction =
            match Self::insert_transaction_in_tx(&mut tx, &card, entry, new_balance).await {
                Ok(t) => t,
                Err(e) if is_unique_violation(&e) => {
                    // 另一张卡上的同 ref 请求抢先提交
                    tx.rollback().await?;
                    let existing = self
                        .find_transaction_by_ref(card.business_id, &entry.transaction_ref)
                        .await?
                        .ok_or_else(|| LoyaltyError::Storage("唯一约束冲突但流水不存在".into()))?;
                    return self.replay(existing).await;
                }
                Err(e) => return Err(e),
            };

        Self::update_balance_in_tx(&mut tx, card.id, new_balance).await?;

        tx.commit().await?;

        Ok(AppliedTransaction {
            transaction,
            new_balance,
            replayed: false,
        })
    }

    async fn get_card(&self, card_id: i64) -> Result<Option<Card>> {
        let card = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM loyalty_cards WHERE id = $1"
        ))
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn find_card(&self, customer_id: i64, program_id: i64) -> Result<Option<Card>> {
        let card = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM loyalty_cards WHERE customer_id = $1 AND program_id = $2"
        ))
        .bind(customer_id)
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn list_cards_by_customer(&self, customer_id: i64) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM loyalty_cards WHERE customer_id = $1 ORDER BY created_at, id"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn list_transactions(&self, card_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM loyalty_transactions \
             WHERE card_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(card_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn find_transaction_by_ref(
        &self,
        business_id: i64,
        transaction_ref: &str,
    ) -> Result<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_ref_in_tx(&mut conn, business_id, transaction_ref).await
    }

    async fn set_card_status(&self, card_id: i64, status: CardStatus) -> Result<Card> {
        let card = sqlx::query_as::<_, Card>(&format!(
            "UPDATE loyalty_cards SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {CARD_COLUMNS}"
        ))
        .bind(card_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        card.ok_or(LoyaltyError::CardNotFound(card_id))
    }
}
