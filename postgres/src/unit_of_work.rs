//! Transactional unit of work with advisory named locks.

use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::PgPool;

use emporium_core::error::DomainError;
use emporium_core::uow::{sorted_lock_names, UnitOfWork};

/// A transaction owning its pooled connection.
pub type PgTransaction = sqlx::Transaction<'static, sqlx::Postgres>;

/// Builds a service's repository provider around an open transaction.
///
/// Each bounded context implements this for its provider type; the provider
/// exposes the context's repositories and the outbox dispatcher, all bound
/// to the same transaction.
pub trait TxProvider: Send {
    /// Wrap an open transaction.
    fn from_tx(tx: PgTransaction) -> Self;

    /// Give the transaction back for commit or rollback.
    fn into_tx(self) -> PgTransaction;
}

/// Unit of work over a connection pool.
///
/// `execute_locked` opens a transaction, takes the named locks in sorted
/// order via `pg_advisory_xact_lock`, runs the body against a fresh
/// provider and commits on success. Advisory xact locks are released by the
/// database at transaction end, commit and rollback alike, which gives the
/// cluster-wide mutual exclusion the aggregates rely on.
pub struct PgUnitOfWork<P> {
    pool: PgPool,
    _provider: PhantomData<fn() -> P>,
}

impl<P> PgUnitOfWork<P> {
    /// Unit of work over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _provider: PhantomData,
        }
    }
}

impl<P> Clone for PgUnitOfWork<P> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _provider: PhantomData,
        }
    }
}

#[async_trait]
impl<P: TxProvider + 'static> UnitOfWork for PgUnitOfWork<P> {
    type Provider = P;

    async fn execute_locked<T, F>(&self, locks: Vec<String>, body: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Self::Provider) -> BoxFuture<'a, Result<T, DomainError>>
            + Send
            + 'static,
    {
        let mut tx = self.pool.begin().await.map_err(DomainError::internal)?;

        // hashtextextended maps the lock name onto the bigint advisory
        // lock keyspace; sorted acquisition prevents lock-order deadlocks.
        for name in sorted_lock_names(locks) {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(&name)
                .execute(&mut *tx)
                .await
                .map_err(DomainError::internal)?;
        }

        let mut provider = P::from_tx(tx);
        match body(&mut provider).await {
            Ok(value) => {
                provider
                    .into_tx()
                    .commit()
                    .await
                    .map_err(DomainError::internal)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = provider.into_tx().rollback().await {
                    tracing::error!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}
