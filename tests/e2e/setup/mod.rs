//! 测试环境设置模块

mod environment;

pub use environment::{
    BUSINESS, CUSTOMER, OTHER_BUSINESS, OTHER_CUSTOMER, PROGRAM, SECOND_PROGRAM, TestEnvironment,
};
