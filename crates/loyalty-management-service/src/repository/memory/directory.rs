//! 内存目录

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::models::{Customer, Program};
use crate::repository::DirectoryRepository;

/// 内存中的会员计划与顾客目录
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    programs: DashMap<i64, Program>,
    customers: DashMap<i64, Customer>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_program(&self, program: Program) {
        self.programs.insert(program.id, program);
    }

    pub fn insert_customer(&self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    pub fn with_program(self, id: i64, business_id: i64, name: &str) -> Self {
        self.insert_program(Program {
            id,
            business_id,
            name: name.to_string(),
            active: true,
        });
        self
    }

    pub fn with_customer(self, id: i64, display_name: &str) -> Self {
        self.insert_customer(Customer {
            id,
            display_name: display_name.to_string(),
        });
        self
    }
}

#[async_trait]
impl DirectoryRepository for MemoryDirectory {
    async fn get_program(&self, program_id: i64) -> Result<Option<Program>> {
        Ok(self.programs.get(&program_id).map(|p| p.clone()))
    }

    async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        Ok(self.customers.get(&customer_id).map(|c| c.clone()))
    }
}
