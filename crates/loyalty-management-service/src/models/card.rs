//! 会员卡与账本流水实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{CardStatus, TransactionKind};

/// 新卡的默认等级
pub const DEFAULT_TIER: &str = "STANDARD";

/// 会员卡
///
/// 每个 (customer_id, program_id) 至多一张。余额是已落账流水的带符号合计，不会为负。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub customer_id: i64,
    pub program_id: i64,
    /// 冗余自 program，便于按商家做权限判断
    pub business_id: i64,
    pub balance: i64,
    pub status: CardStatus,
    pub tier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    /// 按流水方向计算落账后的余额，结果为负时返回 None
    pub fn balance_after(&self, kind: TransactionKind, amount: i64) -> Option<i64> {
        let next = self.balance.checked_add(kind.sign() * amount)?;
        (next >= 0).then_some(next)
    }
}

/// 账本流水
///
/// 只追加不修改。transaction_ref 在同一商家范围内唯一，重复提交按重放处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub card_id: i64,
    pub customer_id: i64,
    pub business_id: i64,
    pub program_id: i64,
    pub kind: TransactionKind,
    /// 恒为正数，方向由 kind 决定
    pub amount: i64,
    pub source_tag: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub transaction_ref: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// 待落账的流水
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub card_id: i64,
    pub kind: TransactionKind,
    pub amount: i64,
    pub transaction_ref: String,
    pub source_tag: String,
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn credit(card_id: i64, amount: i64, transaction_ref: impl Into<String>) -> Self {
        Self {
            card_id,
            kind: TransactionKind::Credit,
            amount,
            transaction_ref: transaction_ref.into(),
            source_tag: "MANUAL".to_string(),
            description: None,
        }
    }

    pub fn debit(card_id: i64, amount: i64, transaction_ref: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::Debit,
            ..Self::credit(card_id, amount, transaction_ref)
        }
    }

    pub fn with_source(mut self, source_tag: impl Into<String>) -> Self {
        self.source_tag = source_tag.into();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// 落账结果
///
/// `replayed` 为 true 表示 transaction_ref 已存在，返回的是原流水，余额未变。
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransaction {
    pub transaction: Transaction,
    pub new_balance: i64,
    pub replayed: bool,
}
