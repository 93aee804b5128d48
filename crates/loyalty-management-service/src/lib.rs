//! 积分核心服务
//!
//! 多商户积分体系的领域核心，由 API 进程装配使用。
//!
//! ## 核心功能
//!
//! - **积分账本**：会员卡余额与只追加流水，按 transaction_ref 幂等
//! - **积分发放**：校验商家归属后为顾客发放或扣减积分
//! - **审批流程**：商家发起、顾客确认的入会与扣减请求，支持过期
//! - **通知分发**：通知落库并向在线会话实时推送
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 仓储层（PostgreSQL 与内存实现）
//! - `service`: 业务服务层
//! - `notification`: 通知与实时推送
//! - `lock`: 进程内按键互斥锁
//! - `worker`: 后台任务
//! - `bootstrap`: 服务装配

pub mod bootstrap;
pub mod error;
pub mod lock;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;
pub mod worker;

pub use bootstrap::ServiceContainer;
pub use error::{LoyaltyError, Result};
pub use models::*;
pub use notification::{FanoutEvent, NotificationFanout, RealtimeHub, Subscription};
pub use service::{ApprovalService, AwardService, dto};
pub use worker::ExpireWorker;
