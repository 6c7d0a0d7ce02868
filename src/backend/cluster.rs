//! Cluster: read/write split across a primary and replicas.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::driver::Driver;

use super::{transaction, Connection, Error, Execute, Pool, Query};

/// One side of a cluster: either a pool over an upstream, or a single
/// standalone connection.
pub enum Node<D: Driver> {
    Connection(Arc<Mutex<Connection<D>>>),
    Pool(Pool<D>),
}

impl<D: Driver> Clone for Node<D> {
    fn clone(&self) -> Self {
        match self {
            Node::Connection(conn) => Node::Connection(conn.clone()),
            Node::Pool(pool) => Node::Pool(pool.clone()),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Node<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Connection(_) => f.write_str("Node::Connection"),
            Node::Pool(pool) => write!(f, "Node::Pool({})", pool.id()),
        }
    }
}

impl<D: Driver> Node<D> {
    /// Node over a single standalone connection.
    pub fn single(conn: Connection<D>) -> Self {
        Node::Connection(Arc::new(Mutex::new(conn)))
    }
}

impl<D: Driver> From<Connection<D>> for Node<D> {
    fn from(conn: Connection<D>) -> Self {
        Node::single(conn)
    }
}

impl<D: Driver> From<Pool<D>> for Node<D> {
    fn from(pool: Pool<D>) -> Self {
        Node::Pool(pool)
    }
}

#[async_trait]
impl<D: Driver> Execute<D> for Node<D> {
    async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error> {
        match self {
            Node::Connection(conn) => conn.lock().await.execute(query).await,
            Node::Pool(pool) => pool.execute(query).await,
        }
    }
}

/// Routes queries by read intent: reads go to the replica side, writes
/// go to the primary inside a transaction. A cluster without a primary
/// is read-only and rejects writes outright.
pub struct Cluster<D: Driver> {
    master: Option<Node<D>>,
    slave: Node<D>,
}

impl<D: Driver> Clone for Cluster<D> {
    fn clone(&self) -> Self {
        Self {
            master: self.master.clone(),
            slave: self.slave.clone(),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Cluster<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("master", &self.master)
            .field("slave", &self.slave)
            .finish()
    }
}

impl<D: Driver> Cluster<D> {
    /// New cluster with both sides. The primary side can double as the
    /// replica side by passing the same node twice.
    pub fn new(master: impl Into<Node<D>>, slave: impl Into<Node<D>>) -> Self {
        Self {
            master: Some(master.into()),
            slave: slave.into(),
        }
    }

    /// New cluster with replicas only.
    pub fn read_only_cluster(slave: impl Into<Node<D>>) -> Self {
        Self {
            master: None,
            slave: slave.into(),
        }
    }

    pub fn master(&self) -> Option<&Node<D>> {
        self.master.as_ref()
    }

    pub fn slave(&self) -> &Node<D> {
        &self.slave
    }

    /// No primary side is configured.
    pub fn read_only(&self) -> bool {
        self.master.is_none()
    }
}

#[async_trait]
impl<D: Driver> Execute<D> for Cluster<D> {
    async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error> {
        if query.readonly() {
            debug!("routing read to replica side");
            return self.slave.execute(query).await;
        }

        match &self.master {
            Some(master) => {
                debug!("routing write to primary side");
                master.execute(&transaction(query.clone())).await
            }
            None => Err(Error::ReadOnlyCluster),
        }
    }
}
