//! A bounded-concurrency admission primitive: callers request admission for
//! a task, run it while holding the returned permit, and drop the permit to
//! signal completion.
//!
//! Modeled on `automations::server`'s use of `tokio::sync::Semaphore` plus
//! `acquire_many_owned` to wait for all outstanding work to drain: the
//! orchestrator uses two independent [`Limiter`]s (one for tenants, one for
//! intra-tenant block fetches), and admitting through one never blocks on
//! the other.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A counted semaphore bounding how many tasks may run concurrently.
#[derive(Clone)]
pub struct Limiter {
    capacity: u32,
    semaphore: Arc<Semaphore>,
}

impl Limiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1) as u32;
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
        }
    }

    /// Blocks until a slot is free, then returns a permit. Dropping the
    /// permit returns the slot to the pool.
    pub async fn admit(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("Limiter's semaphore is never closed")
    }

    /// Waits until every admitted task has completed (i.e. every permit has
    /// been returned), then returns. Callers must stop admitting new tasks
    /// before calling this, or it may never observe every permit free at
    /// once.
    pub async fn join(&self) {
        let _ = self
            .semaphore
            .clone()
            .acquire_many_owned(self.capacity)
            .await
            .expect("Limiter's semaphore is never closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn bounds_concurrent_admission() {
        let limiter = Limiter::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.admit().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn join_waits_for_outstanding_permits() {
        let limiter = Limiter::new(3);
        let permit = limiter.admit().await;
        let limiter2 = limiter.clone();
        let joined = tokio::spawn(async move { limiter2.join().await });

        tokio::task::yield_now().await;
        assert!(!joined.is_finished());

        drop(permit);
        joined.await.unwrap();
    }

    #[tokio::test]
    async fn independent_limiters_do_not_block_each_other() {
        let tenants = Limiter::new(1);
        let blocks = Limiter::new(1);

        let _tenant_permit = tenants.admit().await;
        // Admitting into the other limiter must not block even though the
        // first is fully saturated.
        let _block_permit = tokio::time::timeout(std::time::Duration::from_millis(200), blocks.admit())
            .await
            .expect("admitting a sub-task through a different Limiter must not deadlock");
    }
}
