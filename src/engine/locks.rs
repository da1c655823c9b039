//! Per-plan critical sections.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per plan id. Holding the guard serialises generation and
/// session edits for that plan; different plans never contend.
#[derive(Debug, Default)]
pub struct PlanLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PlanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, plan_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting
        let lock = self
            .locks
            .entry(plan_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the entry of a deleted plan
    pub fn forget(&self, plan_id: &str) {
        self.locks.remove(plan_id);
    }

    /// Drop the entry only when nobody holds or waits on it. Used after a
    /// lookup found no such plan, so unknown ids do not pile up.
    pub fn forget_if_idle(&self, plan_id: &str) {
        self.locks
            .remove_if(plan_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_plan_is_exclusive() {
        let locks = PlanLocks::new();
        let guard = locks.acquire("p1").await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p1")).await;
        assert!(blocked.is_err());

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p1")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_different_plans_do_not_contend() {
        let locks = PlanLocks::new();
        let _a = locks.acquire("p1").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);

        locks.forget("p2");
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_forget_if_idle_keeps_held_locks() {
        let locks = PlanLocks::new();
        let guard = locks.acquire("p1").await;
        locks.forget_if_idle("p1");
        assert_eq!(locks.len(), 1);

        drop(guard);
        locks.forget_if_idle("p1");
        assert!(locks.is_empty());
    }
}
