// ABOUTME: TTL-bound distributed mutual exclusion on top of the shared cache
// ABOUTME: Deduplicates periodic background work across horizontally-scaled instances

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheBackend;

/// A distributed lock keyed by task name. At most one service instance holds
/// a given key at a time; expiry is the only release mechanism guaranteed
/// correct when a holder crashes mid-task.
///
/// Callers must pick a TTL comfortably larger than the task's worst-case
/// duration so a second instance cannot acquire the lock mid-run.
#[derive(Clone)]
pub struct DistributedLock {
    backend: Arc<dyn CacheBackend>,
    namespace: String,
    holder_id: String,
}

impl DistributedLock {
    pub fn new(backend: Arc<dyn CacheBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            holder_id: format!("warren-{}", std::process::id()),
        }
    }

    fn key(&self, task_name: &str) -> String {
        format!("{}:{}", self.namespace, task_name)
    }

    /// Try to acquire the lock for one cycle of `task_name`.
    ///
    /// Returns true iff this instance should run the task. On a backend
    /// error, `fail_closed` decides: closed (the default posture) skips the
    /// cycle, which is the safe choice for tasks with non-idempotent side
    /// effects; open proceeds anyway and is reserved for idempotent tasks
    /// where a skipped cycle is worse than a duplicated one.
    pub async fn try_acquire(&self, task_name: &str, ttl_secs: u64, fail_closed: bool) -> bool {
        let key = self.key(task_name);
        match self
            .backend
            .set_nx_ex(&key, &self.holder_id, ttl_secs)
            .await
        {
            Ok(acquired) => {
                if acquired {
                    debug!(task = %task_name, ttl_secs, "Acquired distributed lock");
                } else {
                    debug!(task = %task_name, "Lock held by another instance, skipping");
                }
                acquired
            }
            Err(e) => {
                warn!(
                    task = %task_name,
                    error = %e,
                    fail_closed,
                    "Lock backend unavailable"
                );
                !fail_closed
            }
        }
    }

    /// Best-effort release. Safe to omit: the TTL guarantees eventual release.
    pub async fn release(&self, task_name: &str) {
        let key = self.key(task_name);
        if let Err(e) = self.backend.delete(&key).await {
            debug!(task = %task_name, error = %e, "Lock release failed, TTL will expire it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::error::{CoordinationError, Result};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn set_nx_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<bool> {
            Err(CoordinationError::Backend("connection refused".to_string()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(CoordinationError::Backend("connection refused".to_string()))
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
            Err(CoordinationError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(CoordinationError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn exactly_one_of_two_concurrent_acquires_wins() {
        let backend = Arc::new(MemoryBackend::new());
        let lock_a = DistributedLock::new(backend.clone(), "test:lock");
        let lock_b = DistributedLock::new(backend, "test:lock");

        let (a, b) = tokio::join!(
            lock_a.try_acquire("cleanup", 5, true),
            lock_b.try_acquire("cleanup", 5, true)
        );
        assert!(a ^ b, "exactly one acquire should succeed, got {a} and {b}");
    }

    #[tokio::test]
    async fn lock_is_reacquirable_after_ttl() {
        let backend = Arc::new(MemoryBackend::new());
        let lock = DistributedLock::new(backend, "test:lock");

        assert!(lock.try_acquire("cleanup", 1, true).await);
        assert!(!lock.try_acquire("cleanup", 1, true).await);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(lock.try_acquire("cleanup", 1, true).await);
    }

    #[tokio::test]
    async fn release_makes_lock_available_immediately() {
        let backend = Arc::new(MemoryBackend::new());
        let lock = DistributedLock::new(backend, "test:lock");

        assert!(lock.try_acquire("cleanup", 30, true).await);
        lock.release("cleanup").await;
        assert!(lock.try_acquire("cleanup", 30, true).await);
    }

    #[tokio::test]
    async fn locks_are_independent_per_task_name() {
        let backend = Arc::new(MemoryBackend::new());
        let lock = DistributedLock::new(backend, "test:lock");

        assert!(lock.try_acquire("cleanup", 30, true).await);
        assert!(lock.try_acquire("usage", 30, true).await);
    }

    #[tokio::test]
    async fn backend_error_respects_fail_posture() {
        let lock = DistributedLock::new(Arc::new(FailingBackend), "test:lock");
        assert!(!lock.try_acquire("cleanup", 30, true).await);
        assert!(lock.try_acquire("cleanup", 30, false).await);
    }
}
