//! 内存存储
//!
//! 使用 DashMap 实现的高并发内存存储，适用于单机部署、开发环境和测试。
//! 语义与 PostgreSQL 实现保持一致：同卡落账串行、ref 去重、条件状态迁移。

mod approval;
mod directory;
mod ledger;
mod notification;

pub use approval::MemoryApprovalRepository;
pub use directory::MemoryDirectory;
pub use ledger::MemoryLedgerStore;
pub use notification::{MemoryNotificationRepository, MemoryPreferenceRepository};

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// 自增主键表
///
/// 读取返回克隆，不把 DashMap 的锁泄露给调用方。
#[derive(Debug)]
pub(crate) struct Table<T> {
    rows: DashMap<i64, T>,
    sequence: AtomicI64,
}

impl<T: Clone> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            sequence: AtomicI64::new(0),
        }
    }
}

impl<T: Clone> Table<T> {
    /// 分配下一个主键
    pub fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn insert(&self, id: i64, value: T) {
        self.rows.insert(id, value);
    }

    pub fn get(&self, id: i64) -> Option<T> {
        self.rows.get(&id).map(|v| v.clone())
    }

    /// 在行锁内修改，返回修改后的克隆
    pub fn update<F>(&self, id: i64, f: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        self.rows.get_mut(&id).map(|mut row| {
            f(row.value_mut());
            row.value().clone()
        })
    }

    /// 条件修改：predicate 为真时才应用 f
    pub fn update_if<P, F>(&self, id: i64, predicate: P, f: F) -> Option<T>
    where
        P: FnOnce(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut row = self.rows.get_mut(&id)?;
        if !predicate(row.value()) {
            return None;
        }
        f(row.value_mut());
        Some(row.value().clone())
    }

    pub fn list_by<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.rows
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }
}
