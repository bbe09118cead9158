//! Testing utilities for the emporium services.
//!
//! Provides in-memory implementations of the kernel seams so domain and
//! application logic can be exercised without a database or broker:
//!
//! - [`InMemoryUnitOfWork`]: snapshot-rollback transactions over a cloneable
//!   provider state, plus async named locks — the same atomicity and
//!   mutual-exclusion guarantees as the postgres unit of work;
//! - [`NamedLocks`]: sorted-order named mutexes;
//! - [`RecordingEventBus`]: captures published envelopes for assertions;
//! - [`FixedClock`] / [`test_clock`]: deterministic time.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use tokio::sync::{Mutex, OwnedMutexGuard};

use emporium_core::bus::{EventBus, EventBusError};
use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::EventEnvelope;
use emporium_core::uow::{sorted_lock_names, UnitOfWork};

/// Fixed clock for deterministic tests: always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Clock pinned to the given instant.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Default fixed clock for tests (2025-01-01 00:00:00 UTC).
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default())
}

/// Async named mutexes acquired in sorted order.
///
/// Mirrors the advisory-lock discipline of the postgres unit of work: two
/// tasks sharing a lock name serialize, and sorting prevents acquisition
/// deadlocks.
#[derive(Default)]
pub struct NamedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NamedLocks {
    /// Empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire all names in sorted order, returning the guards.
    pub async fn acquire(&self, names: Vec<String>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::new();
        for name in sorted_lock_names(names) {
            let lock = {
                let mut locks = self.locks.lock().await;
                Arc::clone(locks.entry(name).or_insert_with(|| Arc::new(Mutex::new(()))))
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// In-memory unit of work over a cloneable provider state.
///
/// The body runs against the shared state under a big lock; on error the
/// pre-body snapshot is restored, so repository writes and dispatched
/// events roll back together exactly like a database transaction.
pub struct InMemoryUnitOfWork<P> {
    state: Arc<Mutex<P>>,
    locks: Arc<NamedLocks>,
}

impl<P> Clone for InMemoryUnitOfWork<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<P: Default> Default for InMemoryUnitOfWork<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P> InMemoryUnitOfWork<P> {
    /// Unit of work over an initial provider state.
    #[must_use]
    pub fn new(state: P) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            locks: Arc::new(NamedLocks::new()),
        }
    }

    /// Read the current state for assertions.
    pub async fn read<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Mutate the state directly (test seeding).
    pub async fn seed(&self, f: impl FnOnce(&mut P)) {
        let mut state = self.state.lock().await;
        f(&mut state);
    }
}

#[async_trait]
impl<P> UnitOfWork for InMemoryUnitOfWork<P>
where
    P: Clone + Send + 'static,
{
    type Provider = P;

    async fn execute_locked<T, F>(&self, locks: Vec<String>, body: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Self::Provider) -> BoxFuture<'a, Result<T, DomainError>>
            + Send
            + 'static,
    {
        let _guards = self.locks.acquire(locks).await;
        let mut state = self.state.lock().await;
        let snapshot = state.clone();
        match body(&mut *state).await {
            Ok(value) => Ok(value),
            Err(err) => {
                *state = snapshot;
                Err(err)
            }
        }
    }
}

/// Event bus that records everything published to it.
#[derive(Default)]
pub struct RecordingEventBus {
    published: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All envelopes published so far.
    pub async fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().await.clone()
    }

    /// Event type strings in publish order.
    pub async fn event_types(&self) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), EventBusError> {
        self.published.lock().await.push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let uow = InMemoryUnitOfWork::new(vec![1]);
        let result: Result<(), DomainError> = uow
            .execute(|state: &mut Vec<i32>| {
                Box::pin(async move {
                    state.push(2);
                    Err(DomainError::Internal("boom".into()))
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(uow.read(Clone::clone).await, vec![1]);
    }

    #[tokio::test]
    async fn commit_keeps_changes() {
        let uow = InMemoryUnitOfWork::new(vec![1]);
        uow.execute(|state: &mut Vec<i32>| {
            Box::pin(async move {
                state.push(2);
                Ok(())
            })
        })
        .await
        .expect("commit");
        assert_eq!(uow.read(Clone::clone).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn named_locks_serialize_bodies_sharing_a_name() {
        let uow = Arc::new(InMemoryUnitOfWork::new(Vec::<i32>::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let uow = Arc::clone(&uow);
            handles.push(tokio::spawn(async move {
                uow.execute_locked(vec!["shared".to_string()], move |state: &mut Vec<i32>| {
                    Box::pin(async move {
                        state.push(i);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        state.push(i);
                        Ok(())
                    })
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("body");
        }

        // Serialized bodies leave adjacent pairs; interleaving would break them.
        let state = uow.read(Clone::clone).await;
        assert_eq!(state.len(), 8);
        for pair in state.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }
}
