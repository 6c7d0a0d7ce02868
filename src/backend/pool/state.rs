use crate::driver::Driver;

use super::Pool;

/// Point-in-time pool state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Capacity not yet materialized as connections.
    pub reserve: usize,
    /// Number of idle connections.
    pub idle: usize,
    /// Number of connections checked out by callers.
    pub checked_out: usize,
    /// Number of callers waiting for a slot.
    pub waiting: usize,
    /// Pool capacity.
    pub capacity: usize,
}

impl State {
    pub(super) fn get<D: Driver>(pool: &Pool<D>) -> Self {
        let inner = pool.lock();

        State {
            reserve: inner.reserve,
            idle: inner.idle(),
            checked_out: inner.checked_out,
            waiting: inner.waiting,
            capacity: pool.capacity(),
        }
    }
}
