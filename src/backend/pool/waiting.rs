use crate::driver::Driver;

use super::Pool;

/// Bumps the waiter count back down when an acquire stops waiting,
/// timed out or not.
pub(super) struct Waiting<D: Driver> {
    pool: Pool<D>,
}

impl<D: Driver> Waiting<D> {
    /// The caller already registered itself under the pool lock.
    pub(super) fn registered(pool: Pool<D>) -> Self {
        Self { pool }
    }
}

impl<D: Driver> Drop for Waiting<D> {
    fn drop(&mut self) {
        self.pool.lock().waiting -= 1;
    }
}
