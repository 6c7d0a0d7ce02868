//! One live connection and its transaction state.

use std::sync::Arc;

use crate::driver::{Driver, DriverConnection};

use super::{Error, Query, ServerInfo};

/// Per-connection counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Queries executed on this connection.
    pub queries: usize,
    /// Transactions committed.
    pub commits: usize,
    /// Transactions rolled back.
    pub rollbacks: usize,
}

/// A live driver connection plus the server it was opened against.
///
/// Exactly one owner at a time: the upstream while being created, the
/// pool while idle, the caller while checked out.
pub struct Connection<D: Driver> {
    inner: D::Conn,
    meta: Arc<ServerInfo>,
    readonly: bool,
    depth: usize,
    stats: ConnectionStats,
}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("server", &self.meta.to_string())
            .field("readonly", &self.readonly)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<D: Driver> Connection<D> {
    pub(crate) fn new(inner: D::Conn, meta: Arc<ServerInfo>, readonly: bool) -> Self {
        Self {
            inner,
            meta,
            readonly,
            depth: 0,
            stats: ConnectionStats::default(),
        }
    }

    /// The server this connection was opened against.
    pub fn meta(&self) -> &Arc<ServerInfo> {
        &self.meta
    }

    /// Inherited from the upstream's role: replica connections are
    /// read-only, primary connections are not.
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// The underlying socket is closed.
    pub fn closed(&self) -> bool {
        self.inner.closed()
    }

    /// A transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Raw driver handle.
    pub fn handle(&self) -> &D::Conn {
        &self.inner
    }

    pub fn handle_mut(&mut self) -> &mut D::Conn {
        &mut self.inner
    }

    /// Commit the current transaction.
    pub async fn commit(&mut self) -> Result<(), Error> {
        self.inner.commit().await?;
        self.stats.commits += 1;
        self.depth = 0;
        Ok(())
    }

    /// Roll back the current transaction. A rollback failure surfaces
    /// as its own error, never silently.
    pub async fn rollback(&mut self) -> Result<(), Error> {
        self.inner.rollback().await.map_err(Error::RollbackFailed)?;
        self.stats.rollbacks += 1;
        self.depth = 0;
        Ok(())
    }

    /// Run a query on this connection.
    ///
    /// Transactional queries are depth-tracked: `begin` fires before the
    /// outermost body, and only the outermost invocation commits on
    /// success or rolls back on error. Nested transactional queries on
    /// the same connection are no-ops with respect to transaction
    /// boundaries, so any depth of nesting commits exactly once. A body
    /// that calls [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback) itself ends the transaction; no
    /// second commit or rollback follows.
    pub async fn execute<T>(&mut self, query: &Query<D, T>) -> Result<T, Error> {
        self.stats.queries += 1;

        if !query.transactional() {
            return query.invoke(self).await;
        }

        if self.depth == 0 {
            self.inner.begin().await?;
        }
        self.depth += 1;

        let result = query.invoke(self).await;

        // A manual commit or rollback inside the body already closed
        // the transaction.
        if self.depth == 0 {
            return result;
        }

        self.depth -= 1;
        if self.depth > 0 {
            return result;
        }

        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                // Roll back before re-raising so no partial writes
                // stay visible.
                self.rollback().await?;
                Err(err)
            }
        }
    }
}
