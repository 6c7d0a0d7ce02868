//! Connection guard.

use std::ops::{Deref, DerefMut};

use tokio::spawn;
use tracing::error;

use crate::backend::Connection;
use crate::driver::{Driver, DriverConnection};

use super::Pool;

/// A checked-out connection. Checks itself back into the pool on drop.
pub struct Guard<D: Driver> {
    conn: Option<Connection<D>>,
    pool: Pool<D>,
}

impl<D: Driver> std::fmt::Debug for Guard<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

impl<D: Driver> Guard<D> {
    pub(super) fn new(pool: Pool<D>, conn: Connection<D>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Roll back any unfinished transaction and check the connection
    /// back into the pool.
    fn checkin(&mut self) {
        let conn = self.conn.take();
        let pool = self.pool.clone();

        if let Some(mut conn) = conn {
            if conn.in_transaction() && !conn.closed() {
                // The caller abandoned a transaction mid-flight. Roll it
                // back off the hot path before the connection is reused.
                spawn(async move {
                    if let Err(err) = conn.rollback().await {
                        error!(
                            "rollback of abandoned transaction failed: {} [{}]",
                            err,
                            conn.meta()
                        );
                        conn.handle_mut().close();
                    }
                    pool.checkin(conn);
                });
            } else {
                pool.checkin(conn);
            }
        }
    }
}

impl<D: Driver> Deref for Guard<D> {
    type Target = Connection<D>;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().unwrap()
    }
}

impl<D: Driver> DerefMut for Guard<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().unwrap()
    }
}

impl<D: Driver> Drop for Guard<D> {
    fn drop(&mut self) {
        self.checkin();
    }
}
