// ==========================================
// 铸机排产系统 - 铸机级互斥
// ==========================================
// 红线: 同一铸机上的 校验→移位→提交 必须串行
// 不同铸机互不影响
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 铸机锁注册表(每台铸机一把锁, 首次使用时创建)
#[derive(Debug, Default)]
pub struct CasterLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CasterLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取铸机锁句柄
    pub fn handle(&self, caster_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(caster_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 已登记的铸机数
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 进入铸机临界区
///
/// 提交是事务性的, 持锁线程 panic 后时间轴仍一致, 因此中毒后继续使用
pub fn enter(handle: &Arc<Mutex<()>>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("铸机锁已中毒, 继续使用");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_caster_shares_lock() {
        let registry = CasterLockRegistry::new();
        let a1 = registry.handle("CASTER-1");
        let a2 = registry.handle("CASTER-1");
        let b = registry.handle("CASTER-2");

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_different_casters_do_not_block() {
        let registry = CasterLockRegistry::new();
        let a = registry.handle("CASTER-1");
        let b = registry.handle("CASTER-2");

        let _guard_a = enter(&a);
        // 另一台铸机的锁可立即获取
        assert!(b.try_lock().is_ok());
        assert!(a.try_lock().is_err());
    }
}
