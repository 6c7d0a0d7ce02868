//! Upstream server list and failover.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::{LoadBalancingStrategy, ServerConfig};
use crate::driver::Driver;

use super::{Connection, Error, ServerInfo};

/// Upstream settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamConfig {
    /// Connections from this upstream serve reads only.
    pub read_only: bool,
    /// How candidates of equal penalty are ordered.
    pub lb_strategy: LoadBalancingStrategy,
}

/// Argument to [`Upstream::invalidate`]: a checked-out connection or the
/// server itself.
pub enum Invalidate<'a, D: Driver> {
    Connection(&'a Connection<D>),
    Server(&'a ServerInfo),
}

impl<'a, D: Driver> From<&'a Connection<D>> for Invalidate<'a, D> {
    fn from(conn: &'a Connection<D>) -> Self {
        Invalidate::Connection(conn)
    }
}

impl<'a, D: Driver> From<&'a ServerInfo> for Invalidate<'a, D> {
    fn from(server: &'a ServerInfo) -> Self {
        Invalidate::Server(server)
    }
}

/// The candidate server list. Sole authority for turning a configured
/// server into a live connection, while tracking failures through
/// penalty scores.
pub struct Upstream<D: Driver> {
    driver: Arc<D>,
    servers: Vec<Arc<ServerInfo>>,
    // One entry per virtual slot; a server with count N appears N times.
    slots: Vec<usize>,
    round_robin: AtomicUsize,
    config: UpstreamConfig,
}

impl<D: Driver> std::fmt::Debug for Upstream<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("servers", &self.servers)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl<D: Driver> Upstream<D> {
    /// New upstream over the configured server list.
    pub fn new(servers: &[ServerConfig], driver: Arc<D>, config: UpstreamConfig) -> Self {
        let servers: Vec<_> = servers
            .iter()
            .map(|server| Arc::new(ServerInfo::new(server.addr(), server.count)))
            .collect();

        let mut slots = Vec::new();
        for (index, server) in servers.iter().enumerate() {
            slots.extend(std::iter::repeat(index).take(server.count()));
        }

        Self {
            driver,
            servers,
            slots,
            round_robin: AtomicUsize::new(0),
            config,
        }
    }

    /// Total number of upstream slots (servers weighted by count).
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Configured servers.
    pub fn servers(&self) -> &[Arc<ServerInfo>] {
        &self.servers
    }

    pub fn read_only(&self) -> bool {
        self.config.read_only
    }

    /// Open a connection to the best candidate.
    ///
    /// Candidates are ordered by penalty, rotating among equals so load
    /// spreads instead of always hitting the first configured server.
    /// Each failed open penalizes that server and moves on; once every
    /// server has been tried, the acquire fails. Retrying is the
    /// caller's concern.
    pub async fn next(&self) -> Result<Connection<D>, Error> {
        if self.slots.is_empty() {
            return Err(Error::NoLiveServers);
        }

        let mut order = self.slots.clone();
        match self.config.lb_strategy {
            LoadBalancingStrategy::Random => order.shuffle(&mut rand::thread_rng()),
            LoadBalancingStrategy::RoundRobin => {
                let first = self.round_robin.fetch_add(1, Ordering::Relaxed) % order.len();
                order.rotate_left(first);
            }
        }
        // Stable sort: rotation order is preserved among equal penalties.
        order.sort_by_key(|index| self.servers[*index].penalty());

        let mut tried = vec![false; self.servers.len()];
        for index in order {
            if std::mem::replace(&mut tried[index], true) {
                continue;
            }

            let server = &self.servers[index];
            match self.driver.connect(server.addr()).await {
                Ok(conn) => {
                    server.reset_penalty();
                    debug!("connected to {}", server);
                    return Ok(Connection::new(conn, server.clone(), self.config.read_only));
                }
                Err(err) => {
                    let penalty = server.penalize();
                    warn!("connection to {} failed: {} (penalty {})", server, err, penalty);
                }
            }
        }

        Err(Error::NoLiveServers)
    }

    /// Record a failure against the server behind a connection (or the
    /// server itself), sinking it in selection priority. Returns the new
    /// penalty.
    pub fn invalidate<'a>(&self, target: impl Into<Invalidate<'a, D>>) -> u32 {
        let server = match target.into() {
            Invalidate::Connection(conn) => conn.meta().as_ref(),
            Invalidate::Server(server) => server,
        };
        let penalty = server.penalize();
        warn!("invalidated {} (penalty {})", server, penalty);
        penalty
    }
}
