//! Pool internals synchronized with a mutex.

use std::collections::VecDeque;

use crate::backend::Connection;
use crate::driver::Driver;

/// Pool internals protected by a mutex.
pub(super) struct Inner<D: Driver> {
    /// Capacity not yet materialized as connections.
    pub(super) reserve: usize,
    /// Idle connections ready for checkout.
    pub(super) idle: VecDeque<Connection<D>>,
    /// Connections currently checked out by callers.
    pub(super) checked_out: usize,
    /// Number of callers waiting for a slot.
    pub(super) waiting: usize,
}

impl<D: Driver> std::fmt::Debug for Inner<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("reserve", &self.reserve)
            .field("idle", &self.idle.len())
            .field("checked_out", &self.checked_out)
            .field("waiting", &self.waiting)
            .finish()
    }
}

impl<D: Driver> Inner<D> {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            reserve: capacity,
            idle: VecDeque::new(),
            checked_out: 0,
            waiting: 0,
        }
    }

    /// Number of idle connections in the pool.
    #[inline]
    pub(super) fn idle(&self) -> usize {
        self.idle.len()
    }

    /// `reserve + idle + checked_out` stays equal to this for the
    /// pool's lifetime.
    #[inline]
    pub(super) fn total(&self) -> usize {
        self.reserve + self.idle() + self.checked_out
    }
}
