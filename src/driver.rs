//! Driver seam.
//!
//! The wire protocol belongs to the driver. The routing layer only needs
//! to open connections, manage transaction boundaries and tell a dead
//! socket from a live one.

use async_trait::async_trait;
use thiserror::Error;

use crate::backend::Addr;

/// Client can't reach the server at all.
pub const CR_CONNECTION_ERROR: u16 = 2002;
/// Client can't reach the server over TCP.
pub const CR_CONN_HOST_ERROR: u16 = 2003;
/// Server closed the connection between queries.
pub const CR_SERVER_GONE_ERROR: u16 = 2006;
/// Connection dropped mid-query.
pub const CR_SERVER_LOST: u16 = 2013;

/// Error reported by the underlying driver, carrying the client error code.
#[derive(Debug, Clone, Error)]
#[error("{message} (code {code})")]
pub struct DriverError {
    /// Client error code.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

impl DriverError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn connection_lost() -> Self {
        Self::new(CR_SERVER_LOST, "connection lost")
    }

    /// The connection died under us. Safe to retry on a live handle.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self.code, CR_SERVER_GONE_ERROR | CR_SERVER_LOST)
    }
}

/// Factory for live driver connections.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Conn: DriverConnection;

    /// Open a connection to the given address.
    async fn connect(&self, addr: &Addr) -> Result<Self::Conn, DriverError>;
}

/// One live connection owned by the driver.
#[async_trait]
pub trait DriverConnection: Send + 'static {
    /// Start a transaction.
    async fn begin(&mut self) -> Result<(), DriverError>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// The underlying socket is closed.
    fn closed(&self) -> bool;

    /// Close the underlying socket.
    fn close(&mut self);
}
