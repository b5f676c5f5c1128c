//! Bulkhead resource isolation.
//!
//! # Responsibilities
//! - Cap in-flight operations per named pool
//! - Reject (never queue) when a pool is at capacity
//! - Release capacity on every exit path, including cancellation
//!
//! # Design Decisions
//! - Pools are independent counters; exhausting one never blocks another
//! - Acquisition is a compare-exchange loop so concurrent callers never
//!   push `current` past `max_concurrent`
//! - Release happens in `Drop` of [`PoolPermit`]
//! - Re-adding a pool name resizes the live pool; its counter is never reset

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::config::BulkheadConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::observability::metrics;

/// A fixed-capacity pool.
#[derive(Debug)]
pub struct BulkheadPool {
    name: String,
    max_concurrent: AtomicUsize,
    current: AtomicUsize,
    rejected: AtomicU64,
}

/// Snapshot of a pool's occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub name: String,
    pub max_concurrent: usize,
    pub current: usize,
    pub rejected: u64,
}

impl BulkheadPool {
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            name: name.into(),
            max_concurrent: AtomicUsize::new(max_concurrent),
            current: AtomicUsize::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::Acquire)
    }

    /// Change the capacity. Operations already in flight keep their slots;
    /// after a shrink no new slot is handed out until `current` drops below
    /// the new limit.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.max_concurrent.store(max_concurrent, Ordering::Release);
    }

    /// Operations currently in flight.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            name: self.name.clone(),
            max_concurrent: self.max_concurrent(),
            current: self.current(),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Take a slot, or `None` when the pool is full.
    pub fn try_acquire(&self) -> Option<PoolPermit<'_>> {
        let mut prev = self.current.load(Ordering::Acquire);
        loop {
            if prev >= self.max_concurrent() {
                return None;
            }
            match self.current.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        metrics::record_pool_in_flight(&self.name, prev + 1);
        Some(PoolPermit { pool: self })
    }

    /// Run `operation` inside this pool.
    ///
    /// Fails immediately with a retryable `ResourceExhaustion` error when the
    /// pool is full; the operation is not invoked in that case.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ServiceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let _permit = match self.try_acquire() {
            Some(permit) => permit,
            None => {
                let max_concurrent = self.max_concurrent();
                self.rejected.fetch_add(1, Ordering::Relaxed);
                metrics::record_pool_rejection(&self.name);
                tracing::warn!(
                    pool = %self.name,
                    max_concurrent,
                    "Bulkhead pool exhausted, rejecting operation"
                );
                return Err(ServiceError::pool_exhausted(&self.name, max_concurrent));
            }
        };
        operation().await
    }
}

/// A held pool slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct PoolPermit<'a> {
    pool: &'a BulkheadPool,
}

impl Drop for PoolPermit<'_> {
    fn drop(&mut self) {
        let remaining = self.pool.current.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_pool_in_flight(&self.pool.name, remaining);
    }
}

/// Named collection of pools.
#[derive(Debug, Default)]
pub struct Bulkhead {
    pools: DashMap<String, Arc<BulkheadPool>>,
}

impl Bulkhead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &BulkheadConfig) -> Self {
        let bulkhead = Self::new();
        for pool in &config.pools {
            bulkhead.add_pool(&pool.name, pool.max_concurrent);
        }
        bulkhead
    }

    /// Add a pool, or resize the one already registered under `name`.
    ///
    /// A resized pool keeps its in-flight count and rejection total, so
    /// permits held across the call still count against the new limit.
    pub fn add_pool(&self, name: &str, max_concurrent: usize) -> Arc<BulkheadPool> {
        match self.pools.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let pool = existing.get().clone();
                tracing::warn!(
                    pool = %name,
                    from = pool.max_concurrent(),
                    to = max_concurrent,
                    in_flight = pool.current(),
                    "Resized existing bulkhead pool"
                );
                pool.set_max_concurrent(max_concurrent);
                pool
            }
            Entry::Vacant(slot) => slot
                .insert(Arc::new(BulkheadPool::new(name, max_concurrent)))
                .value()
                .clone(),
        }
    }

    pub fn pool(&self, name: &str) -> Option<Arc<BulkheadPool>> {
        self.pools.get(name).map(|p| p.value().clone())
    }

    /// Run `operation` in the pool called `pool`.
    pub async fn execute_with_pool<T, F, Fut>(&self, operation: F, pool: &str) -> ServiceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        // Clone the handle so no map shard lock is held across the await.
        let handle = self.pool(pool).ok_or_else(|| ServiceError::unknown_pool(pool))?;
        handle.execute(operation).await
    }

    pub fn all_pools_status(&self) -> BTreeMap<String, PoolStatus> {
        self.pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    async fn hold(ms: u64) -> ServiceResult<u64> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_beyond_capacity() {
        let pool = BulkheadPool::new("critical", 2);
        let results = futures_util::future::join_all(
            (0..4).map(|_| pool.execute(|| hold(100))),
        )
        .await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let exhausted: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(ok, 2);
        assert_eq!(exhausted.len(), 2);
        for err in exhausted {
            assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
            assert!(err.is_retryable());
        }
        assert_eq!(pool.current(), 0);
        assert_eq!(pool.status().rejected, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_released_on_failure_and_cancel() {
        let pool = BulkheadPool::new("reports", 1);

        let err = pool
            .execute(|| async { Err::<(), _>(ServiceError::network("reset")) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(pool.current(), 0);

        let stuck = pool.execute(|| hold(60_000));
        assert!(tokio::time::timeout(Duration::from_millis(5), stuck).await.is_err());
        assert_eq!(pool.current(), 0);

        assert_eq!(pool.execute(|| hold(1)).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pools_are_independent() {
        let bulkhead = Bulkhead::new();
        bulkhead.add_pool("critical", 1);
        bulkhead.add_pool("non-critical", 1);

        let busy = bulkhead.execute_with_pool(|| hold(100), "non-critical");
        let other = async {
            tokio::task::yield_now().await;
            (
                bulkhead.execute_with_pool(|| hold(1), "non-critical").await,
                bulkhead.execute_with_pool(|| hold(1), "critical").await,
            )
        };
        let (busy, (same_pool, other_pool)) = tokio::join!(busy, other);

        assert!(busy.is_ok());
        assert_eq!(same_pool.unwrap_err().kind(), ErrorKind::ResourceExhaustion);
        assert_eq!(other_pool.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_pool() {
        let bulkhead = Bulkhead::from_config(&BulkheadConfig::default());
        let err = bulkhead
            .execute_with_pool(|| async { Ok(()) }, "missing")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPool);
        assert!(!err.is_retryable());

        let status = bulkhead.all_pools_status();
        assert_eq!(status["critical"].max_concurrent, 10);
        assert_eq!(status["non-critical"].max_concurrent, 5);
    }

    #[test]
    fn test_re_adding_pool_resizes_in_place() {
        let bulkhead = Bulkhead::new();
        let original = bulkhead.add_pool("reports", 2);
        let held = original.try_acquire().unwrap();
        let _also_held = original.try_acquire().unwrap();

        let resized = bulkhead.add_pool("reports", 3);
        assert!(Arc::ptr_eq(&original, &resized));
        assert_eq!(resized.max_concurrent(), 3);
        assert_eq!(bulkhead.all_pools_status()["reports"].current, 2);

        // Held permits still count: only one more slot is free.
        let _third = resized.try_acquire().unwrap();
        assert!(resized.try_acquire().is_none());

        // Shrinking never evicts in-flight work, it only blocks new slots.
        bulkhead.add_pool("reports", 1);
        drop(held);
        assert_eq!(resized.current(), 2);
        assert!(resized.try_acquire().is_none());
    }
}
