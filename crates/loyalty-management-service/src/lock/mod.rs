//! 进程内按键互斥锁
//!
//! 同一个键（会员卡 id、审批请求 id）上的操作串行执行，不同键之间互不阻塞。
//! 跨进程的互斥由数据库行锁和条件更新保证，这里只消除单实例内的竞争。
//!
//! ## 使用示例
//!
//! ```ignore
//! let locks = KeyedLock::<i64>::new();
//!
//! let _guard = locks.lock(card_id).await;
//! // 受保护的读-改-写
//! ```

mod keyed_lock;

pub use keyed_lock::{KeyedLock, KeyedLockGuard};
