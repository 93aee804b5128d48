//! DTO 模块
//!
//! 包含所有请求和响应的数据传输对象

pub mod extract;
pub mod request;
pub mod response;

pub use extract::ValidatedJson;
pub use request::{
    AwardPointsBody, CreateApprovalBody, LimitQuery, RespondBody, UpdatePreferencesBody,
};
pub use response::{ApiResponse, MarkAllReadResponse, RespondEnvelope, RespondResponse};
