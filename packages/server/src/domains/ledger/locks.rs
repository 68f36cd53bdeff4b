use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::common::IdentityId;

/// Per-account mutual exclusion inside this process.
///
/// Accounts are always locked in ascending id order, so two transfers over the same
/// pair in opposite directions cannot deadlock. Disjoint pairs never contend.
#[derive(Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<IdentityId, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop.
pub struct AccountGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, ids: &[IdentityId]) -> Result<AccountGuard> {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let slots = {
            let mut map = self
                .slots
                .lock()
                .map_err(|_| anyhow!("account lock table poisoned"))?;
            // Drop slots nobody holds or waits on.
            map.retain(|_, slot| Arc::strong_count(slot) > 1);
            ordered
                .iter()
                .map(|id| map.entry(*id).or_default().clone())
                .collect::<Vec<_>>()
        };

        let mut guards = Vec::with_capacity(slots.len());
        for slot in slots {
            guards.push(slot.lock_owned().await);
        }
        Ok(AccountGuard { _guards: guards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let a = IdentityId::new();

        let held = locks.acquire(&[a]).await.unwrap();
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(&[a]).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        contender.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_opposite_order_does_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());
        let a = IdentityId::new();
        let b = IdentityId::new();

        let mut tasks = Vec::new();
        for i in 0..50 {
            let locks = locks.clone();
            let pair = if i % 2 == 0 { [a, b] } else { [b, a] };
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire(&pair).await.unwrap();
                tokio::task::yield_now().await;
            }));
        }

        let all = futures::future::join_all(tasks);
        let results = tokio::time::timeout(Duration::from_secs(5), all).await.unwrap();
        assert!(results.into_iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_duplicate_ids_lock_once() {
        let locks = AccountLocks::new();
        let a = IdentityId::new();
        let _guard = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&[a, a]))
            .await
            .unwrap()
            .unwrap();
    }
}
