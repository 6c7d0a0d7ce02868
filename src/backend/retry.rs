//! Retry wrapper for transient connection loss.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use crate::driver::Driver;

use super::{Error, Execute, Query};

/// Re-executes a query when the driver reports connection loss, up to a
/// fixed attempt budget, sleeping between attempts. Any other error
/// propagates immediately.
///
/// Wraps anything with an execute surface: around a single connection
/// node the same handle is reused across attempts; around a pool each
/// attempt re-acquires, so a retry after a dead handle gets a fresh
/// connection (the pool discards dead handles on check-in).
pub struct Retryable<E> {
    inner: E,
    retry_count: usize,
    delay: Duration,
    attempts: AtomicUsize,
}

impl<E> Retryable<E> {
    /// Wrap an executor with a total attempt budget of `retry_count`.
    pub fn new(inner: E, retry_count: usize, delay: Duration) -> Self {
        Self {
            inner,
            retry_count: retry_count.max(1),
            delay,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Attempts made so far, across all queries.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// The wrapped executor.
    pub fn get_ref(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<D: Driver, E: Execute<D>> Execute<D> for Retryable<E> {
    async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.attempts.fetch_add(1, Ordering::Relaxed);

            match self.inner.execute(query).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connection_lost() && attempt < self.retry_count => {
                    warn!(
                        "connection lost, retrying in {:?} (attempt {}/{}): {}",
                        self.delay, attempt, self.retry_count, err
                    );
                    sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
