//! 会员计划与顾客目录
//!
//! 目录数据由外部系统维护，这里只读。

use serde::{Deserialize, Serialize};

/// 会员计划，归属于唯一的商家
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub active: bool,
}

/// 顾客
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub display_name: String,
}

/// 顾客查询暂不可用时通知里使用的称呼
pub const PLACEHOLDER_CUSTOMER_NAME: &str = "顾客";
