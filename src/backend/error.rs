//! Backend errors.
use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no live upstream servers")]
    NoLiveServers,

    #[error("checkout timeout")]
    CheckoutTimeout,

    #[error("the operation is not permitted on read-only cluster")]
    ReadOnlyCluster,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("rollback failed: {0}")]
    RollbackFailed(DriverError),

    #[error(transparent)]
    Config(#[from] crate::config::Error),

    #[error(transparent)]
    Query(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an opaque caller error raised inside a query body.
    pub fn query(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Query(err.into())
    }

    /// The connection died under us; a retry wrapper may recover.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Driver(err) if err.is_connection_lost())
    }
}
