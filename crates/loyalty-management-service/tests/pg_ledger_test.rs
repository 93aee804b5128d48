//! PostgreSQL 账本集成测试
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p loyalty-management-service --test pg_ledger_test -- --ignored
//! ```

use std::sync::Arc;

use loyalty_management::repository::{LedgerStore, PgLedgerStore};
use loyalty_management::{LedgerEntry, LoyaltyError};
use loyalty_shared::database::Database;
use sqlx::PgPool;

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests")
}

async fn setup() -> PgPool {
    let pool = PgPool::connect(&database_url())
        .await
        .expect("数据库连接失败");
    Database::from_pool(pool.clone())
        .run_migrations()
        .await
        .expect("迁移失败");
    pool
}

/// 每个测试使用独立的 customer/program，避免互相干扰
fn unique_ids() -> (i64, i64, i64) {
    let seed = chrono::Utc::now().timestamp_micros() % 1_000_000_000;
    (seed, seed + 1, seed + 2)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn pg_replay_and_overdraw() {
    let pool = setup().await;
    let store = PgLedgerStore::new(pool);
    let (customer, program, business) = unique_ids();

    let card = store
        .get_or_create_card(customer, program, business)
        .await
        .unwrap();
    let again = store
        .get_or_create_card(customer, program, business)
        .await
        .unwrap();
    assert_eq!(card.id, again.id);

    let first = store
        .apply_transaction(&LedgerEntry::credit(card.id, 50, "t1"))
        .await
        .unwrap();
    let replay = store
        .apply_transaction(&LedgerEntry::credit(card.id, 50, "t1"))
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.transaction.id, first.transaction.id);
    assert_eq!(replay.new_balance, 50);

    let err = store
        .apply_transaction(&LedgerEntry::debit(card.id, 51, "t2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::InsufficientBalance { .. }));
    assert_eq!(store.get_card(card.id).await.unwrap().unwrap().balance, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires DATABASE_URL"]
async fn pg_concurrent_identical_refs_apply_once() {
    let pool = setup().await;
    let store = Arc::new(PgLedgerStore::new(pool));
    let (customer, program, business) = unique_ids();
    let card = store
        .get_or_create_card(customer, program, business)
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .apply_transaction(&LedgerEntry::credit(card.id, 20, "same"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut fresh = 0;
    for h in handles {
        if !h.await.unwrap().replayed {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(
        store.list_transactions(card.id, 100).await.unwrap().len(),
        1
    );
}
