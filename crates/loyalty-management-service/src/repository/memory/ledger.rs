//! 内存积分账本

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::Table;
use crate::error::{LoyaltyError, Result};
use crate::lock::KeyedLock;
use crate::models::{
    AppliedTransaction, Card, CardStatus, DEFAULT_TIER, LedgerEntry, Transaction,
};
use crate::repository::{LedgerStore, next_balance, validate_entry};

/// 内存积分账本
///
/// - 同一张卡的落账由按卡互斥锁串行化
/// - `(business_id, transaction_ref)` 的占位在 DashMap 分片锁内完成，跨卡重复提交也只落账一次
/// - (customer, program) 索引同样在分片锁内创建，保证一人一卡
#[derive(Default)]
pub struct MemoryLedgerStore {
    cards: Table<Card>,
    card_index: DashMap<(i64, i64), i64>,
    transactions: Table<Transaction>,
    refs: DashMap<(i64, String), i64>,
    card_locks: KeyedLock<i64>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn replay(&self, transaction_id: i64) -> Result<AppliedTransaction> {
        let transaction = self
            .transactions
            .get(transaction_id)
            .ok_or_else(|| LoyaltyError::Storage(format!("流水索引损坏: {transaction_id}")))?;
        let card = self
            .cards
            .get(transaction.card_id)
            .ok_or(LoyaltyError::CardNotFound(transaction.card_id))?;

        Ok(AppliedTransaction {
            transaction,
            new_balance: card.balance,
            replayed: true,
        })
    }

    /// 流水总数（测试断言用）
    pub fn transaction_count(&self) -> usize {
        self.transactions.count()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_or_create_card(
        &self,
        customer_id: i64,
        program_id: i64,
        business_id: i64,
    ) -> Result<Card> {
        let card_id = *self
            .card_index
            .entry((customer_id, program_id))
            .or_insert_with(|| {
                let now = Utc::now();
                let id = self.cards.next_id();
                self.cards.insert(
                    id,
                    Card {
                        id,
                        customer_id,
                        program_id,
                        business_id,
                        balance: 0,
                        status: CardStatus::Active,
                        tier: DEFAULT_TIER.to_string(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                id
            });

        self.cards
            .get(card_id)
            .ok_or(LoyaltyError::CardNotFound(card_id))
    }

    async fn apply_transaction(&self, entry: &LedgerEntry) -> Result<AppliedTransaction> {
        validate_entry(entry)?;

        let _guard = self.card_locks.lock(entry.card_id).await;

        let card = self
            .cards
            .get(entry.card_id)
            .ok_or(LoyaltyError::CardNotFound(entry.card_id))?;

        match self
            .refs
            .entry((card.business_id, entry.transaction_ref.clone()))
        {
            Entry::Occupied(existing) => {
                let transaction_id = *existing.get();
                drop(existing);
                self.replay(transaction_id)
            }
            Entry::Vacant(slot) => {
                // 余额不足时直接返回，占位随 slot 一起丢弃
                let new_balance = next_balance(&card, entry)?;
                let now = Utc::now();
                let transaction = Transaction {
                    id: self.transactions.next_id(),
                    card_id: card.id,
                    customer_id: card.customer_id,
                    business_id: card.business_id,
                    program_id: card.program_id,
                    kind: entry.kind,
                    amount: entry.amount,
                    source_tag: entry.source_tag.clone(),
                    description: entry.description.clone(),
                    transaction_ref: entry.transaction_ref.clone(),
                    balance_after: new_balance,
                    created_at: now,
                };

                self.transactions.insert(transaction.id, transaction.clone());
                self.cards.update(card.id, |c| {
                    c.balance = new_balance;
                    c.updated_at = now;
                });
                slot.insert(transaction.id);

                Ok(AppliedTransaction {
                    transaction,
                    new_balance,
                    replayed: false,
                })
            }
        }
    }

    async fn get_card(&self, card_id: i64) -> Result<Option<Card>> {
        Ok(self.cards.get(card_id))
    }

    async fn find_card(&self, customer_id: i64, program_id: i64) -> Result<Option<Card>> {
        let card_id = self.card_index.get(&(customer_id, program_id)).map(|id| *id);
        Ok(card_id.and_then(|id| self.cards.get(id)))
    }

    async fn list_cards_by_customer(&self, customer_id: i64) -> Result<Vec<Card>> {
        let mut cards = self.cards.list_by(|c| c.customer_id == customer_id);
        cards.sort_by_key(|c| (c.created_at, c.id));
        Ok(cards)
    }

    async fn list_transactions(&self, card_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let mut transactions = self.transactions.list_by(|t| t.card_id == card_id);
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        transactions.truncate(limit.max(0) as usize);
        Ok(transactions)
    }

    async fn find_transaction_by_ref(
        &self,
        business_id: i64,
        transaction_ref: &str,
    ) -> Result<Option<Transaction>> {
        let transaction_id = self
            .refs
            .get(&(business_id, transaction_ref.to_string()))
            .map(|id| *id);
        Ok(transaction_id.and_then(|id| self.transactions.get(id)))
    }

    async fn set_card_status(&self, card_id: i64, status: CardStatus) -> Result<Card> {
        let _guard = self.card_locks.lock(card_id).await;
        self.cards
            .update(card_id, |c| {
                c.status = status;
                c.updated_at = Utc::now();
            })
            .ok_or(LoyaltyError::CardNotFound(card_id))
    }
}
