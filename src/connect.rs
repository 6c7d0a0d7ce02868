//! Entry point: build a handle from connection arguments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::backend::{
    Cluster, Connection, Error, Execute, Node, Pool, Query, ServerInfo, Upstream, UpstreamConfig,
};
use crate::config::{ConnectArgs, ServerConfig};
use crate::driver::Driver;

/// How long an acquire waits for a pool slot.
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// What [`connect`] produced, shaped by the arguments:
///
/// * both `master` and `slave` lists make a read/write cluster,
/// * a `slave` list alone makes a read-only cluster,
/// * a `master` list alone makes a plain pool,
/// * neither makes a single standalone connection.
///
/// Every shape executes queries, so callers that only run queries never
/// need to match on it.
pub enum Handle<D: Driver> {
    Cluster(Cluster<D>),
    Pool(Pool<D>),
    Connection(Node<D>),
}

impl<D: Driver> Clone for Handle<D> {
    fn clone(&self) -> Self {
        match self {
            Handle::Cluster(cluster) => Handle::Cluster(cluster.clone()),
            Handle::Pool(pool) => Handle::Pool(pool.clone()),
            Handle::Connection(node) => Handle::Connection(node.clone()),
        }
    }
}

impl<D: Driver> std::fmt::Debug for Handle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handle::Cluster(cluster) => write!(f, "Handle::Cluster({:?})", cluster),
            Handle::Pool(pool) => write!(f, "Handle::Pool({:?})", pool),
            Handle::Connection(_) => f.write_str("Handle::Connection"),
        }
    }
}

#[async_trait]
impl<D: Driver> Execute<D> for Handle<D> {
    async fn execute<T: Send + 'static>(&self, query: &Query<D, T>) -> Result<T, Error> {
        match self {
            Handle::Cluster(cluster) => cluster.execute(query).await,
            Handle::Pool(pool) => pool.execute(query).await,
            Handle::Connection(node) => node.execute(query).await,
        }
    }
}

/// Connect using the given arguments and driver.
pub async fn connect<D: Driver>(args: ConnectArgs, driver: D) -> Result<Handle<D>, Error> {
    let driver = Arc::new(driver);
    let masters = args.master_servers().map_err(Error::Config)?;
    let slaves = args.slave_servers().map_err(Error::Config)?;

    let pool = |servers: &[ServerConfig], read_only: bool| {
        Pool::new(
            Upstream::new(
                servers,
                driver.clone(),
                UpstreamConfig {
                    read_only,
                    ..Default::default()
                },
            ),
            DEFAULT_CHECKOUT_TIMEOUT,
        )
    };

    match (masters.is_empty(), slaves.is_empty()) {
        (false, false) => {
            info!(
                "connecting to cluster ({} primary, {} replica servers)",
                masters.len(),
                slaves.len()
            );
            Ok(Handle::Cluster(Cluster::new(
                pool(&masters, false),
                pool(&slaves, true),
            )))
        }
        (true, false) => {
            info!("connecting to read-only cluster ({} servers)", slaves.len());
            Ok(Handle::Cluster(Cluster::read_only_cluster(pool(
                &slaves, true,
            ))))
        }
        (false, true) => {
            info!("connecting to pool ({} servers)", masters.len());
            Ok(Handle::Pool(pool(&masters, false)))
        }
        (true, true) => {
            let server = args.default_server();
            info!("connecting to {}", server.addr());
            let conn = driver.connect(&server.addr()).await?;
            let meta = Arc::new(ServerInfo::new(server.addr(), server.count));
            Ok(Handle::Connection(Node::single(Connection::new(
                conn, meta, false,
            ))))
        }
    }
}

/// Connect using a `key=value;...` connection string.
pub async fn connect_str<D: Driver>(dsn: &str, driver: D) -> Result<Handle<D>, Error> {
    connect(dsn.parse::<ConnectArgs>().map_err(Error::Config)?, driver).await
}

#[cfg(test)]
mod test {
    use futures::FutureExt;

    use crate::backend::test::TestDriver;
    use crate::backend::QueryKind;

    use super::*;

    #[tokio::test]
    async fn test_connect_cluster() {
        let handle = connect_str(
            "master=localhost:3306#2,localhost#4;slave=localhost:3307#2;database=test",
            TestDriver::default(),
        )
        .await
        .unwrap();

        let cluster = match &handle {
            Handle::Cluster(cluster) => cluster,
            other => panic!("expected cluster, got {:?}", other),
        };
        assert!(!cluster.read_only());

        // The primary pool is sized by the weighted server counts.
        match cluster.master().unwrap() {
            Node::Pool(pool) => {
                assert_eq!(pool.capacity(), 6);
                assert!(!pool.upstream().read_only());
            }
            other => panic!("expected pool, got {:?}", other),
        }
        match cluster.slave() {
            Node::Pool(pool) => {
                assert_eq!(pool.capacity(), 2);
                assert!(pool.upstream().read_only());
            }
            other => panic!("expected pool, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_read_only() {
        let handle = connect_str("slave=localhost:3307", TestDriver::default())
            .await
            .unwrap();

        match &handle {
            Handle::Cluster(cluster) => assert!(cluster.read_only()),
            other => panic!("expected cluster, got {:?}", other),
        }

        let err = handle
            .execute(&Query::write(|_conn: &mut Connection<TestDriver>| {
                async move { Ok(()) }.boxed()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyCluster));
    }

    #[tokio::test]
    async fn test_connect_pool() {
        let handle = connect_str("master=localhost:3306#3", TestDriver::default())
            .await
            .unwrap();

        match &handle {
            Handle::Pool(pool) => assert_eq!(pool.capacity(), 3),
            other => panic!("expected pool, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_single() {
        let driver = TestDriver::default();
        let handle = connect_str("database=test", driver.clone()).await.unwrap();

        assert!(matches!(handle, Handle::Connection(_)));
        assert_eq!(driver.opened(), 1);

        let meta = handle
            .execute(&Query::read(|conn: &mut Connection<TestDriver>| {
                async move { Ok(conn.meta().to_string()) }.boxed()
            }))
            .await
            .unwrap();
        assert_eq!(meta, "localhost:3306");
    }

    #[tokio::test]
    async fn test_connect_bad_args() {
        let err = connect_str("master=localhost:port", TestDriver::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = connect_str("garbage", TestDriver::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_handle_routes() {
        let handle = connect_str(
            "master=localhost:3306;slave=localhost:3307",
            TestDriver::default(),
        )
        .await
        .unwrap();

        for (query, readonly) in [
            (
                Query::read(|conn: &mut Connection<TestDriver>| {
                    async move { Ok(conn.readonly()) }.boxed()
                }),
                true,
            ),
            (
                Query::write(|conn: &mut Connection<TestDriver>| {
                    async move { Ok(conn.readonly()) }.boxed()
                }),
                false,
            ),
        ] {
            assert_eq!(query.kind() == QueryKind::ReadOnly, readonly);
            assert_eq!(handle.execute(&query).await.unwrap(), readonly);
        }
    }
}
