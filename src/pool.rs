//! Bounded pool of reusable sink connections
//!
//! Up to `size` handles are created lazily by a [`ConnectionFactory`]. A
//! checkout waits on a semaphore when every handle is lent out, and the
//! returned [`PooledConnection`] guard puts its handle back on drop, so a
//! borrow is released on every exit path of the borrower.

use async_trait::async_trait;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{Error, Result};

/// Creates the expensive handles a [`ConnectionPool`] lends out
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Handle type produced by this factory
    type Connection: Send + Sync + 'static;

    /// Open a new handle.
    async fn connect(&self) -> Result<Self::Connection>;
}

/// Lazily grown pool of at most `size` handles
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    size: usize,
    permits: Semaphore,
    idle: Mutex<Vec<F::Connection>>,
    created: AtomicUsize,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create an empty pool that will hold at most `size` handles (at least one).
    pub fn new(factory: F, size: usize) -> Self {
        let size = size.max(1);
        Self {
            factory,
            size,
            permits: Semaphore::new(size),
            idle: Mutex::new(Vec::with_capacity(size)),
            created: AtomicUsize::new(0),
        }
    }

    /// Borrow a handle, waiting while all `size` handles are lent out.
    ///
    /// An idle handle is reused when available; otherwise a new one is
    /// created. If creation fails the slot is released before the error
    /// is returned.
    pub async fn checkout(&self) -> Result<PooledConnection<'_, F>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Other("connection pool is closed".to_string()))?;

        let reused = self.lock_idle().pop();
        let connection = match reused {
            Some(connection) => connection,
            None => {
                let connection = self.factory.connect().await?;
                let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(created, size = self.size, "Opened pooled connection");
                connection
            }
        };

        Ok(PooledConnection {
            pool: self,
            connection: Some(connection),
            _permit: permit,
        })
    }

    /// Maximum number of handles
    pub fn size(&self) -> usize {
        self.size
    }

    /// Handles currently lent out
    pub fn outstanding(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    /// Handles created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Handles waiting to be reused
    pub fn idle(&self) -> usize {
        self.lock_idle().len()
    }

    /// Tear the pool down: pending and future checkouts fail and idle handles are dropped.
    pub fn close(&self) {
        self.permits.close();
        let dropped = std::mem::take(&mut *self.lock_idle()).len();
        tracing::debug!(dropped, created = self.created(), "Connection pool closed");
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<F::Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A borrowed handle; returned to its pool when dropped
pub struct PooledConnection<'a, F: ConnectionFactory> {
    pool: &'a ConnectionPool<F>,
    connection: Option<F::Connection>,
    _permit: SemaphorePermit<'a>,
}

impl<F: ConnectionFactory> Deref for PooledConnection<'_, F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection,
            // Only taken in drop
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for PooledConnection<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool_size", &self.pool.size)
            .field("held", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<'_, F> {
    fn drop(&mut self) {
        // Handle goes back before the permit is released; a closed pool keeps nothing
        if let Some(connection) = self.connection.take() {
            let mut idle = self.pool.lock_idle();
            if !self.pool.permits.is_closed() {
                idle.push(connection);
            }
        }
    }
}
