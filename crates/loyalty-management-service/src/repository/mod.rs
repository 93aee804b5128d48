//! 仓储层
//!
//! 提供所有实体的数据访问接口，封装存储细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - PostgreSQL 实现使用 SQLx，行级锁与唯一约束保证并发正确性
//! - 内存实现用于单机运行和测试，语义与 PostgreSQL 实现一致
//! - 定义 trait 接口以支持 mock 测试

mod approval_repo;
mod directory_repo;
mod ledger_repo;
pub mod memory;
mod notification_repo;
mod traits;

pub use approval_repo::PgApprovalRepository;
pub use directory_repo::PgDirectoryRepository;
pub use ledger_repo::PgLedgerStore;
pub use notification_repo::{PgNotificationRepository, PgPreferenceRepository};
pub use traits::*;

use crate::error::{LoyaltyError, Result};
use crate::models::{Card, LedgerEntry, TransactionKind};

/// transaction_ref 最大长度
pub const MAX_TRANSACTION_REF_LEN: usize = 128;

/// 落账前的基本校验，两种存储实现共用
pub(crate) fn validate_entry(entry: &LedgerEntry) -> Result<()> {
    if entry.amount <= 0 {
        return Err(LoyaltyError::Validation(format!(
            "流水金额必须为正数: {}",
            entry.amount
        )));
    }
    if entry.transaction_ref.trim().is_empty() {
        return Err(LoyaltyError::Validation("transaction_ref 不能为空".into()));
    }
    if entry.transaction_ref.len() > MAX_TRANSACTION_REF_LEN {
        return Err(LoyaltyError::Validation(format!(
            "transaction_ref 长度不能超过 {MAX_TRANSACTION_REF_LEN}"
        )));
    }
    Ok(())
}

/// 计算落账后的余额
pub(crate) fn next_balance(card: &Card, entry: &LedgerEntry) -> Result<i64> {
    card.balance_after(entry.kind, entry.amount)
        .ok_or_else(|| match entry.kind {
            TransactionKind::Debit => LoyaltyError::InsufficientBalance {
                card_id: card.id,
                required: entry.amount,
                available: card.balance,
            },
            TransactionKind::Credit => {
                LoyaltyError::Validation(format!("余额溢出: card_id={}", card.id))
            }
        })
}
