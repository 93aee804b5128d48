//! 认证模块
//!
//! 商家与顾客都使用 JWT Bearer Token，角色写在 Claims 中

pub mod jwt;

pub use jwt::{Claims, JwtConfig, JwtManager, Principal, Role};
