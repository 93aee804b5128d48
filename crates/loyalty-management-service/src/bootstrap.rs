//! 服务装配
//!
//! 按存储后端创建仓储并组装服务，API 进程与测试共用。

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::config::{AppConfig, StorageBackend};
use loyalty_shared::database::Database;
use loyalty_shared::error::InfraError;
use tracing::info;

use crate::models::{Customer, Program};
use crate::notification::{NotificationFanout, RealtimeHub};
use crate::repository::memory::{
    MemoryApprovalRepository, MemoryDirectory, MemoryLedgerStore, MemoryNotificationRepository,
    MemoryPreferenceRepository,
};
use crate::repository::{
    ApprovalRepository, DirectoryRepository, LedgerStore, NotificationRepository,
    PgApprovalRepository, PgDirectoryRepository, PgLedgerStore, PgNotificationRepository,
    PgPreferenceRepository, PreferenceRepository,
};
use crate::service::{ApprovalService, AwardService};
use crate::worker::ExpireWorker;

/// 已装配的服务集合
#[derive(Clone)]
pub struct ServiceContainer {
    pub ledger: Arc<dyn LedgerStore>,
    pub fanout: Arc<NotificationFanout>,
    pub awards: Arc<AwardService>,
    pub approvals: Arc<ApprovalService>,
    database: Option<Database>,
}

struct Repositories {
    ledger: Arc<dyn LedgerStore>,
    directory: Arc<dyn DirectoryRepository>,
    approvals: Arc<dyn ApprovalRepository>,
    notifications: Arc<dyn NotificationRepository>,
    preferences: Arc<dyn PreferenceRepository>,
}

impl ServiceContainer {
    /// 按配置的存储后端装配
    pub async fn from_config(config: &AppConfig) -> Result<Self, InfraError> {
        match config.storage.backend {
            StorageBackend::Postgres => Self::connect(config).await,
            StorageBackend::Memory => Ok(Self::in_memory(config)),
        }
    }

    /// PostgreSQL 后端
    pub async fn connect(config: &AppConfig) -> Result<Self, InfraError> {
        let database = Database::connect(&config.database).await?;
        if config.database.run_migrations {
            database.run_migrations().await?;
        }
        info!("Storage backend: postgres");
        Ok(Self::with_database(database, config))
    }

    /// 使用已建立的连接池装配
    pub fn with_database(database: Database, config: &AppConfig) -> Self {
        let pool = database.pool().clone();
        let repos = Repositories {
            ledger: Arc::new(PgLedgerStore::new(pool.clone())),
            directory: Arc::new(PgDirectoryRepository::new(pool.clone())),
            approvals: Arc::new(PgApprovalRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            preferences: Arc::new(PgPreferenceRepository::new(pool)),
        };
        Self::assemble(repos, config, Some(database))
    }

    /// 内存后端，目录数据取自配置中的预置项
    pub fn in_memory(config: &AppConfig) -> Self {
        let directory = MemoryDirectory::new();
        for seed in &config.storage.programs {
            directory.insert_program(Program {
                id: seed.id,
                business_id: seed.business_id,
                name: seed.name.clone(),
                active: seed.active,
            });
        }
        for seed in &config.storage.customers {
            directory.insert_customer(Customer {
                id: seed.id,
                display_name: seed.display_name.clone(),
            });
        }
        info!(
            programs = config.storage.programs.len(),
            customers = config.storage.customers.len(),
            "Storage backend: memory"
        );
        Self::in_memory_with(directory, config)
    }

    /// 内存后端，使用给定目录
    pub fn in_memory_with(directory: MemoryDirectory, config: &AppConfig) -> Self {
        let repos = Repositories {
            ledger: Arc::new(MemoryLedgerStore::new()),
            directory: Arc::new(directory),
            approvals: Arc::new(MemoryApprovalRepository::new()),
            notifications: Arc::new(MemoryNotificationRepository::new()),
            preferences: Arc::new(MemoryPreferenceRepository::new()),
        };
        Self::assemble(repos, config, None)
    }

    fn assemble(repos: Repositories, config: &AppConfig, database: Option<Database>) -> Self {
        let hub = RealtimeHub::new(config.fanout.channel_capacity);
        let fanout = Arc::new(NotificationFanout::new(
            repos.notifications,
            repos.preferences,
            hub,
        ));
        let awards = Arc::new(AwardService::new(
            repos.ledger.clone(),
            repos.directory.clone(),
            fanout.clone(),
        ));
        let approvals = Arc::new(
            ApprovalService::new(
                repos.approvals,
                repos.ledger.clone(),
                repos.directory,
                awards.clone(),
                fanout.clone(),
            )
            .with_default_ttl(chrono::Duration::days(config.approval.default_ttl_days)),
        );

        Self {
            ledger: repos.ledger,
            fanout,
            awards,
            approvals,
            database,
        }
    }

    /// 按配置创建过期扫描器
    pub fn expire_worker(&self, config: &AppConfig) -> ExpireWorker {
        ExpireWorker::new(
            self.approvals.clone(),
            Duration::from_secs(config.approval.sweep_interval_secs.max(1)),
            config.approval.sweep_batch_size,
        )
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// 存储是否可用，内存后端总是可用
    pub async fn health_check(&self) -> Result<(), InfraError> {
        match &self.database {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }
}
