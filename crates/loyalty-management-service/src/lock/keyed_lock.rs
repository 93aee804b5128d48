//! 按键互斥锁实现

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按键互斥锁
///
/// 每个键对应一个惰性创建的 tokio Mutex，最后一个持有者释放后条目被回收，
/// 键空间不会无限增长。
pub struct KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// 获取键对应的锁，持有期间同键的其他调用方等待
    pub async fn lock(&self, key: K) -> KeyedLockGuard<K> {
        // 克隆 Arc 与回收判断都在分片锁内完成，二者不会交错
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = slot.lock_owned().await;

        KeyedLockGuard {
            guard: Some(guard),
            slots: self.slots.clone(),
            key,
        }
    }

    /// 当前持有或等待中的键数量
    pub fn active_keys(&self) -> usize {
        self.slots.len()
    }
}

/// 锁守卫，drop 时释放锁并尝试回收条目
pub struct KeyedLockGuard<K>
where
    K: Eq + Hash + Clone,
{
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
    key: K,
}

impl<K> Drop for KeyedLockGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        // 仅剩 map 自身的引用时说明没有等待者
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
