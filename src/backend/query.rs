//! Queries and the execution surface.
//!
//! A query is an opaque body running against a live connection, tagged
//! with its read intent so the cluster router can branch on an explicit
//! enum instead of probing the caller.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::driver::Driver;

use super::{Connection, Error};

/// Read intent of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Routed to the replica side, never wrapped in a transaction.
    ReadOnly,
    /// Routed to the primary side inside a transaction.
    Write,
}

type QueryFn<D, T> =
    dyn for<'a> Fn(&'a mut Connection<D>) -> BoxFuture<'a, Result<T, Error>> + Send + Sync;

/// An opaque unit of work executed against one connection.
///
/// The body is reference-counted: queries are cheap to clone and can be
/// re-invoked, which is what retries and nested transactions need.
pub struct Query<D: Driver, T> {
    kind: QueryKind,
    transactional: bool,
    body: Arc<QueryFn<D, T>>,
}

impl<D: Driver, T> Clone for Query<D, T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            transactional: self.transactional,
            body: self.body.clone(),
        }
    }
}

impl<D: Driver, T> std::fmt::Debug for Query<D, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.kind)
            .field("transactional", &self.transactional)
            .finish()
    }
}

impl<D: Driver, T> Query<D, T> {
    /// New read-only query.
    pub fn read<F>(body: F) -> Self
    where
        F: for<'a> Fn(&'a mut Connection<D>) -> BoxFuture<'a, Result<T, Error>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind: QueryKind::ReadOnly,
            transactional: false,
            body: Arc::new(body),
        }
    }

    /// New write query.
    pub fn write<F>(body: F) -> Self
    where
        F: for<'a> Fn(&'a mut Connection<D>) -> BoxFuture<'a, Result<T, Error>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind: QueryKind::Write,
            transactional: false,
            body: Arc::new(body),
        }
    }

    /// Read intent.
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn readonly(&self) -> bool {
        self.kind == QueryKind::ReadOnly
    }

    /// Commit/rollback boundaries apply when this query runs.
    pub fn transactional(&self) -> bool {
        self.transactional
    }

    pub(crate) fn invoke<'a>(
        &self,
        conn: &'a mut Connection<D>,
    ) -> BoxFuture<'a, Result<T, Error>> {
        (self.body)(conn)
    }

    pub(crate) fn into_transactional(mut self) -> Self {
        self.transactional = true;
        self
    }
}

/// Mark a query transactional: the executing connection begins a
/// transaction before the body runs and commits (or rolls back) after it,
/// collapsing nested transactional calls into the outermost one.
pub fn transaction<D: Driver, T>(query: Query<D, T>) -> Query<D, T> {
    query.into_transactional()
}

/// Uniform query execution surface, shared by pools, cluster nodes,
/// clusters and the retry wrapper.
#[async_trait]
pub trait Execute<D: Driver>: Send + Sync {
    async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error>;
}
