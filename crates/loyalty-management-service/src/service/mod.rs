//! 服务层
//!
//! 实现积分业务逻辑，协调账本、目录、审批与通知。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `award_service`: 积分发放与扣减
//! - `approval_service`: 审批请求的创建、处理与过期

pub mod approval_service;
pub mod award_service;
pub mod dto;

pub use approval_service::ApprovalService;
pub use award_service::AwardService;
pub use dto::*;
