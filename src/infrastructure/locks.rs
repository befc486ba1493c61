use crate::domain::ports::{LockScope, ScopeGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-scope async mutexes shared by every transaction on one store.
///
/// Scopes are created lazily. An entry nobody holds or waits on is evicted
/// on the next acquire, so the map tracks only live scopes.
#[derive(Default, Clone)]
pub struct ScopeLocks {
    scopes: Arc<Mutex<HashMap<LockScope, Arc<Mutex<()>>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, scope: LockScope) -> ScopeGuard {
        let lock = {
            let mut scopes = self.scopes.lock().await;
            // Guards and waiters each own a clone; a count of one is idle.
            scopes.retain(|_, lock| Arc::strong_count(lock) > 1);
            scopes.entry(scope).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.scopes.lock().await.len()
    }
}
