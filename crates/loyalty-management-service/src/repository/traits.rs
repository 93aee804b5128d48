//! 仓储 Trait 定义
//!
//! 定义仓储接口，服务层依赖抽象而非具体实现。
//! 每个接口都有 PostgreSQL 与内存两套实现，测试中另可使用 mock。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AppliedTransaction, ApprovalRequest, ApprovalStatus, Card, CardStatus, Customer, LedgerEntry,
    NewApprovalRequest, NewNotification, Notification, NotificationPreferences, Program,
    Transaction,
};

/// 积分账本接口
///
/// 所有余额变动都经由 `apply_transaction` 完成：同一张卡上的落账串行化，
/// 余额变更与流水写入要么都生效要么都不生效。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 获取或创建 (customer, program) 对应的会员卡，并发调用只会产生一张卡
    async fn get_or_create_card(
        &self,
        customer_id: i64,
        program_id: i64,
        business_id: i64,
    ) -> Result<Card>;

    /// 原子地落账一笔流水
    ///
    /// transaction_ref 已存在时返回原流水且不改余额；扣减导致余额为负时返回
    /// `InsufficientBalance` 且不产生任何写入。
    async fn apply_transaction(&self, entry: &LedgerEntry) -> Result<AppliedTransaction>;

    async fn get_card(&self, card_id: i64) -> Result<Option<Card>>;

    async fn find_card(&self, customer_id: i64, program_id: i64) -> Result<Option<Card>>;

    async fn list_cards_by_customer(&self, customer_id: i64) -> Result<Vec<Card>>;

    /// 按时间倒序列出流水
    async fn list_transactions(&self, card_id: i64, limit: i64) -> Result<Vec<Transaction>>;

    async fn find_transaction_by_ref(
        &self,
        business_id: i64,
        transaction_ref: &str,
    ) -> Result<Option<Transaction>>;

    async fn set_card_status(&self, card_id: i64, status: CardStatus) -> Result<Card>;
}

/// 会员计划与顾客目录接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn get_program(&self, program_id: i64) -> Result<Option<Program>>;
    async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>>;
}

/// 审批请求仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn create(&self, request: &NewApprovalRequest) -> Result<ApprovalRequest>;

    async fn get(&self, id: i64) -> Result<Option<ApprovalRequest>>;

    /// 顾客的审批请求，按创建时间倒序
    async fn list_by_customer(
        &self,
        customer_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>>;

    async fn link_notification(&self, id: i64, notification_id: i64) -> Result<()>;

    /// 条件更新：仅当当前状态为 PENDING 时迁移到终态
    ///
    /// 返回 None 表示请求已被其他调用方处理。
    async fn resolve(
        &self,
        id: i64,
        status: ApprovalStatus,
        result_card_id: Option<i64>,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<ApprovalRequest>>;

    /// 截止时间不晚于 now 的 PENDING 请求，按截止时间升序
    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ApprovalRequest>>;

    /// 条件更新：仍为 PENDING 且已到截止时间时标记为 EXPIRED
    ///
    /// 返回 None 表示请求已被处理或尚未到期。
    async fn expire(&self, id: i64, now: DateTime<Utc>) -> Result<Option<ApprovalRequest>>;
}

/// 通知仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;

    async fn get(&self, id: i64) -> Result<Option<Notification>>;

    /// 最近的通知，按时间倒序
    async fn list_by_customer(&self, customer_id: i64, limit: i64) -> Result<Vec<Notification>>;

    async fn list_unread(&self, customer_id: i64) -> Result<Vec<Notification>>;

    /// 未读或需要处理但尚未处理的通知
    async fn list_pending(&self, customer_id: i64) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>>;

    async fn mark_action_taken(&self, id: i64) -> Result<Option<Notification>>;

    /// 返回被标记的条数
    async fn mark_all_read(&self, customer_id: i64) -> Result<u64>;
}

/// 推送偏好仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn get(&self, customer_id: i64) -> Result<Option<NotificationPreferences>>;
    async fn upsert(&self, preferences: &NotificationPreferences)
    -> Result<NotificationPreferences>;
}
