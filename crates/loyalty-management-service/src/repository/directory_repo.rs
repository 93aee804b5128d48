//! 目录仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::DirectoryRepository;
use crate::error::Result;
use crate::models::{Customer, Program};

/// 会员计划与顾客的只读访问
pub struct PgDirectoryRepository {
    pool: PgPool,
}

impl PgDirectoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn get_program(&self, program_id: i64) -> Result<Option<Program>> {
        let program = sqlx::query_as::<_, Program>(
            "SELECT id, business_id, name, active FROM loyalty_programs WHERE id = $1",
        )
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(program)
    }

    async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, display_name FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }
}
