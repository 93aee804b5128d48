//! 测试辅助工具模块

mod api_client;
mod assertions;

pub use api_client::*;
pub use assertions::*;
