//! Connection pool.

use std::pin::{pin, Pin};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::{lock_api::MutexGuard, Mutex, RawMutex};
use tokio::sync::futures::Notified;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::backend::{Connection, Error, Execute, Query, Upstream};
use crate::driver::Driver;

use super::{Comms, Guard, Inner, State, Waiting};

static ID_COUNTER: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));

fn next_pool_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Bounded, reusable set of connections over one upstream.
///
/// Capacity equals the upstream's slot count. Acquires suspend when the
/// pool is exhausted and fail with [`Error::CheckoutTimeout`] once the
/// checkout deadline passes; a timed-out acquire never leaks capacity.
pub struct Pool<D: Driver> {
    inner: Arc<InnerSync<D>>,
}

impl<D: Driver> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct InnerSync<D: Driver> {
    upstream: Upstream<D>,
    inner: Mutex<Inner<D>>,
    comms: Comms,
    capacity: usize,
    timeout: Duration,
    id: u64,
}

impl<D: Driver> std::fmt::Debug for Pool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

enum Checkout<D: Driver> {
    /// An idle connection was available.
    Ready(Connection<D>),
    /// A reserve slot was claimed; open a new connection.
    Create,
}

impl<D: Driver> Pool<D> {
    /// Create new connection pool over the upstream, with the given
    /// checkout timeout.
    pub fn new(upstream: Upstream<D>, timeout: Duration) -> Self {
        let capacity = upstream.slots();
        let id = next_pool_id();

        debug!("new pool of capacity {} [{}]", capacity, id);

        Self {
            inner: Arc::new(InnerSync {
                upstream,
                inner: Mutex::new(Inner::new(capacity)),
                comms: Comms::new(),
                capacity,
                timeout,
                id,
            }),
        }
    }

    /// Pool capacity, constant for the pool's lifetime.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Checkout timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// The upstream this pool draws connections from.
    pub fn upstream(&self) -> &Upstream<D> {
        &self.inner.upstream
    }

    /// Pool unique identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Pool state snapshot.
    pub fn state(&self) -> State {
        State::get(self)
    }

    /// Get a connection from the pool.
    ///
    /// Pops an idle connection if one is queued; opens a new one if a
    /// reserve slot is free; otherwise suspends until a release or the
    /// deadline, measured from the start of this call.
    pub async fn acquire(&self) -> Result<Guard<D>, Error> {
        let deadline = Instant::now() + self.inner.timeout;

        loop {
            let mut notified = pin!(self.comms().ready.notified());

            match self.checkout(Some(notified.as_mut())) {
                Some(Checkout::Ready(conn)) => return Ok(Guard::new(self.clone(), conn)),
                Some(Checkout::Create) => return self.open().await,
                None => {
                    let _waiting = Waiting::registered(self.clone());

                    if timeout_at(deadline, notified).await.is_err() {
                        // One last look: a release may have raced the
                        // timer and our wakeup with it.
                        return match self.checkout(None) {
                            Some(Checkout::Ready(conn)) => Ok(Guard::new(self.clone(), conn)),
                            Some(Checkout::Create) => self.open().await,
                            None => Err(Error::CheckoutTimeout),
                        };
                    }
                }
            }
        }
    }

    /// One checkout attempt under the pool lock. Registers the caller
    /// as a waiter if nothing is available and a wakeup slot is given.
    fn checkout(&self, enlist: Option<Pin<&mut Notified<'_>>>) -> Option<Checkout<D>> {
        let mut inner = self.lock();

        if let Some(conn) = inner.idle.pop_front() {
            inner.checked_out += 1;
            return Some(Checkout::Ready(conn));
        }

        if inner.reserve > 0 {
            inner.reserve -= 1;
            inner.checked_out += 1;
            return Some(Checkout::Create);
        }

        if let Some(notified) = enlist {
            // Registered before the lock drops, so no release can slip
            // past unseen.
            notified.enable();
            inner.waiting += 1;
        }

        None
    }

    /// Open a new connection against a claimed reserve slot, restoring
    /// the slot if the upstream has nothing to offer.
    async fn open(&self) -> Result<Guard<D>, Error> {
        match self.inner.upstream.next().await {
            Ok(conn) => Ok(Guard::new(self.clone(), conn)),
            Err(err) => {
                let mut inner = self.lock();
                inner.checked_out -= 1;
                inner.reserve += 1;
                if inner.waiting > 0 {
                    self.comms().ready.notify_one();
                }
                Err(err)
            }
        }
    }

    /// Check the connection back into the pool. A dead connection is
    /// discarded and its slot returned to the reserve instead of being
    /// queued for reuse.
    pub(crate) fn checkin(&self, conn: Connection<D>) {
        let mut inner = self.lock();
        inner.checked_out -= 1;

        if conn.closed() {
            inner.reserve += 1;
            debug!("discarded dead connection to {} [{}]", conn.meta(), self.inner.id);
        } else {
            inner.idle.push_back(conn);
        }

        debug_assert_eq!(inner.total(), self.inner.capacity);

        // Exactly one waiter becomes runnable per release.
        if inner.waiting > 0 {
            self.comms().ready.notify_one();
        }
    }

    /// Convenience wrapper: acquire, run the query, always release.
    pub async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error> {
        let mut conn = self.acquire().await?;
        let result = conn.execute(query).await;
        drop(conn);
        result
    }

    /// Pool exclusive lock.
    #[inline]
    pub(super) fn lock(&self) -> MutexGuard<'_, RawMutex, Inner<D>> {
        self.inner.inner.lock()
    }

    /// Internal notifications.
    #[inline]
    fn comms(&self) -> &Comms {
        &self.inner.comms
    }
}

#[async_trait]
impl<D: Driver> Execute<D> for Pool<D> {
    async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error> {
        Pool::execute(self, query).await
    }
}

#[cfg(test)]
mod test {
    use futures::FutureExt;
    use tokio::task::JoinSet;
    use tokio::time::sleep;

    use crate::backend::test::{servers, TestDriver};
    use crate::backend::UpstreamConfig;
    use crate::driver::DriverConnection;

    use super::*;

    fn pool(driver: &TestDriver, size: usize, timeout: Duration) -> Pool<TestDriver> {
        let mut configs = servers(&["localhost:3306"]);
        configs[0].count = size;

        Pool::new(
            Upstream::new(
                &configs,
                Arc::new(driver.clone()),
                UpstreamConfig::default(),
            ),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_acquire() {
        crate::logger();

        let driver = TestDriver::default();
        let pool_size = 3;
        let pool = pool(&driver, pool_size, Duration::from_millis(100));

        let mut conns = Vec::new();
        for i in 0..pool_size {
            let conn = pool.acquire().await.unwrap();
            assert_eq!(pool.state().reserve, pool_size - i - 1);
            conns.push(conn);
        }
        assert_eq!(conns.len(), pool_size);
        assert_eq!(pool.state().reserve, 0);
        assert_eq!(pool.state().checked_out, pool_size);
    }

    #[tokio::test]
    async fn test_release() {
        let driver = TestDriver::default();
        let pool = pool(&driver, 3, Duration::from_millis(100));

        let conn = pool.acquire().await.unwrap();
        assert_eq!(pool.state().idle, 0);
        drop(conn);
        assert_eq!(pool.state().idle, 1);
        assert_eq!(pool.state().checked_out, 0);

        // The idle connection is reused, not a new one opened.
        let _conn = pool.acquire().await.unwrap();
        assert_eq!(driver.opened(), 1);
    }

    #[tokio::test]
    async fn test_release_closed_connection() {
        let driver = TestDriver::default();
        let pool_size = 3;
        let pool = pool(&driver, pool_size, Duration::from_millis(100));

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(pool.state().idle, 0);

        conn.handle_mut().close();
        drop(conn);

        // Dead connections are discarded, their slot goes back to the
        // reserve.
        assert_eq!(pool.state().idle, 0);
        assert_eq!(pool.state().reserve, pool_size);
    }

    #[tokio::test]
    async fn test_acquire_if_no_free() {
        let driver = TestDriver::default();
        let pool_size = 3;
        let pool = pool(&driver, pool_size, Duration::from_millis(100));

        let mut conns = Vec::new();
        for _ in 0..pool_size {
            conns.push(pool.acquire().await.unwrap());
        }
        assert_eq!(pool.state().reserve, 0);
        assert_eq!(pool.state().idle, 0);

        let started = Instant::now();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, Error::CheckoutTimeout));
        assert!(started.elapsed() >= Duration::from_millis(100));

        // The timed-out acquire didn't leak capacity.
        assert_eq!(pool.state().waiting, 0);
        let state = pool.state();
        assert_eq!(
            state.reserve + state.idle + state.checked_out,
            state.capacity
        );
    }

    #[tokio::test]
    async fn test_waiter_woken_by_release() {
        let driver = TestDriver::default();
        let pool = pool(&driver, 1, Duration::from_millis(500));

        let conn = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|conn| drop(conn)) })
        };

        sleep(Duration::from_millis(50)).await;
        drop(conn);

        waiter.await.unwrap().unwrap();
        assert_eq!(pool.state().idle, 1);
    }

    #[tokio::test]
    async fn test_execute() {
        let driver = TestDriver::default();
        let pool = pool(&driver, 3, Duration::from_millis(100));

        let meta = pool
            .execute(&Query::read(|conn: &mut Connection<TestDriver>| {
                async move { Ok(conn.meta().to_string()) }.boxed()
            }))
            .await
            .unwrap();
        assert_eq!(meta, "localhost:3306");

        // Released back after the query, success or not.
        assert_eq!(pool.state().idle, 1);
        assert_eq!(pool.state().checked_out, 0);

        let err = pool
            .execute(&Query::read(|_conn: &mut Connection<TestDriver>| {
                async move { Err::<(), _>(Error::query("boom")) }.boxed()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert_eq!(pool.state().checked_out, 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_restores_slot() {
        let driver = TestDriver::default();
        driver.kill("localhost:3306");

        let pool = pool(&driver, 2, Duration::from_millis(100));
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, Error::NoLiveServers));
        assert_eq!(pool.state().reserve, 2);
    }

    #[tokio::test]
    async fn test_concurrency() {
        crate::logger();

        let driver = TestDriver::default();
        let pool = pool(&driver, 3, Duration::from_secs(5));
        let mut tasks = JoinSet::new();

        for i in 0..100u64 {
            let pool = pool.clone();
            tasks.spawn(async move {
                let _conn = pool.acquire().await.unwrap();
                sleep(Duration::from_millis(i % 7)).await;
            });
        }

        while let Some(task) = tasks.join_next().await {
            task.unwrap();
        }

        let state = pool.state();
        assert_eq!(state.checked_out, 0);
        assert_eq!(state.waiting, 0);
        assert_eq!(state.reserve + state.idle, state.capacity);
    }
}
