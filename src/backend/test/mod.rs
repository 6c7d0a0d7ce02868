//! Shared test fixtures: an in-memory driver with controllable failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Addr, Connection, ServerInfo};
use crate::config::ServerConfig;
use crate::driver::{Driver, DriverConnection, DriverError, CR_CONN_HOST_ERROR};

#[derive(Default)]
struct DriverState {
    dead: Mutex<HashSet<String>>,
    opened: AtomicUsize,
}

/// Driver whose servers can be killed and revived by address.
#[derive(Clone, Default)]
pub(crate) struct TestDriver {
    state: Arc<DriverState>,
}

impl TestDriver {
    /// Refuse connections to this address until revived.
    pub(crate) fn kill(&self, addr: &str) {
        self.state.dead.lock().insert(addr.into());
    }

    pub(crate) fn revive(&self, addr: &str) {
        self.state.dead.lock().remove(addr);
    }

    /// Connections opened over the driver's lifetime.
    pub(crate) fn opened(&self) -> usize {
        self.state.opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Driver for TestDriver {
    type Conn = TestConn;

    async fn connect(&self, addr: &Addr) -> Result<Self::Conn, DriverError> {
        if self.state.dead.lock().contains(&addr.to_string()) {
            return Err(DriverError::new(
                CR_CONN_HOST_ERROR,
                format!("can't connect to {}", addr),
            ));
        }

        self.state.opened.fetch_add(1, Ordering::Relaxed);
        Ok(TestConn::default())
    }
}

/// In-memory connection: rows become visible on commit and vanish on
/// rollback, so transaction boundaries are observable.
#[derive(Debug, Default)]
pub(crate) struct TestConn {
    closed: bool,
    in_transaction: bool,
    committed: Vec<String>,
    pending: Vec<String>,
}

impl TestConn {
    pub(crate) fn insert(&mut self, row: &str) {
        if self.in_transaction {
            self.pending.push(row.into());
        } else {
            self.committed.push(row.into());
        }
    }

    /// Committed rows only.
    pub(crate) fn rows(&self) -> Vec<String> {
        self.committed.clone()
    }

    fn live(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::connection_lost())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DriverConnection for TestConn {
    async fn begin(&mut self) -> Result<(), DriverError> {
        self.live()?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.live()?;
        self.committed.append(&mut self.pending);
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.live()?;
        self.pending.clear();
        self.in_transaction = false;
        Ok(())
    }

    fn closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Parse `host:port` specs into server configs.
pub(crate) fn servers(specs: &[&str]) -> Vec<ServerConfig> {
    specs
        .iter()
        .map(|spec| ServerConfig::parse(spec).unwrap())
        .collect()
}

/// Standalone connection, not owned by any pool.
pub(crate) fn test_connection() -> Connection<TestDriver> {
    let meta = Arc::new(ServerInfo::new(
        Addr::Tcp {
            host: "localhost".into(),
            port: 3306,
        },
        1,
    ));
    Connection::new(TestConn::default(), meta, false)
}
