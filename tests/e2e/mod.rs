//! 积分系统端到端测试
//!
//! 在随机端口启动真实的 HTTP/WebSocket 服务（内存后端），覆盖：
//! - 积分发放与幂等重放
//! - 入会与扣分审批
//! - 实时推送与断线对账

pub mod helpers;
pub mod setup;
pub mod suites;

pub use setup::TestEnvironment;
