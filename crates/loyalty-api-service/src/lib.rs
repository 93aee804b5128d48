//! 会员积分 HTTP 服务
//!
//! 对商家与顾客暴露积分发放、审批、通知与实时推送接口。
//!
//! ## 模块结构
//!
//! - `auth`: JWT 签发与校验，区分商家与顾客身份
//! - `dto`: 请求和响应的数据传输对象
//! - `error`: 错误类型与 HTTP 映射
//! - `handlers`: HTTP 与 WebSocket 处理器
//! - `middleware`: 认证中间件
//! - `routes`: 路由配置
//! - `state`: 应用状态

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use routes::build_router;
pub use state::AppState;
