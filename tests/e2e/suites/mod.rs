//! 测试套件模块
//!
//! 按业务流程组织的测试用例集合。

pub mod approval_flow;
pub mod award_flow;
pub mod realtime;
