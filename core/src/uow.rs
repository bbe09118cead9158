//! Unit of work with named locks.
//!
//! A unit of work opens a transactional session, hands a repository
//! provider to the body, and commits on success or rolls back on failure.
//! The locked variant first acquires a set of named cooperative locks — in
//! sorted order, so two bodies that share lock names can never deadlock on
//! acquisition order — and holds them until the transaction ends.
//!
//! Guarantees relied on across the suite:
//!
//! 1. for a given aggregate identity, at most one body holding its lock
//!    name is in flight cluster-wide;
//! 2. repository writes and outbox appends inside one body commit
//!    atomically;
//! 3. on rollback nothing is published.
//!
//! The postgres crate implements this over transactions plus
//! `pg_advisory_xact_lock`; the testing crate provides an in-memory
//! implementation with snapshot rollback and async named mutexes so the
//! same guarantees hold in unit tests.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::DomainError;

/// A transactional session factory bound to a per-service repository
/// provider.
///
/// Application services are generic over this trait; the provider exposes
/// the service's repositories plus the transactional event dispatcher.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// The repository provider handed to bodies.
    type Provider: Send;

    /// Run `body` inside a transaction holding the given named locks.
    ///
    /// Lock names are sorted (and deduplicated) before acquisition. Locks
    /// are released when the transaction ends, commit or rollback alike.
    ///
    /// # Errors
    ///
    /// Returns the body's error after rolling back, or
    /// [`DomainError::Internal`] for transaction failures.
    async fn execute_locked<T, F>(&self, locks: Vec<String>, body: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Self::Provider) -> BoxFuture<'a, Result<T, DomainError>>
            + Send
            + 'static;

    /// Run `body` inside a transaction without named locks.
    ///
    /// # Errors
    ///
    /// Same contract as [`UnitOfWork::execute_locked`].
    async fn execute<T, F>(&self, body: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Self::Provider) -> BoxFuture<'a, Result<T, DomainError>>
            + Send
            + 'static,
    {
        self.execute_locked(Vec::new(), body).await
    }
}

/// Sort and deduplicate lock names into the canonical acquisition order.
#[must_use]
pub fn sorted_lock_names(mut locks: Vec<String>) -> Vec<String> {
    locks.sort();
    locks.dedup();
    locks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_names_are_sorted_and_deduplicated() {
        let locks = vec![
            "user_login_bob".to_string(),
            "user_email_b@x".to_string(),
            "user_login_bob".to_string(),
        ];
        assert_eq!(
            sorted_lock_names(locks),
            vec!["user_email_b@x".to_string(), "user_login_bob".to_string()]
        );
    }
}
