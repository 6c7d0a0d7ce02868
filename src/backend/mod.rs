//! Manage connections to the cluster: servers, pools and query routing.

pub mod cluster;
pub mod connection;
pub mod error;
pub mod pool;
pub mod query;
pub mod retry;
pub mod server_info;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test;

pub use cluster::{Cluster, Node};
pub use connection::{Connection, ConnectionStats};
pub use error::Error;
pub use pool::{Guard, Pool, State};
pub use query::{transaction, Execute, Query, QueryKind};
pub use retry::Retryable;
pub use server_info::{Addr, ServerInfo};
pub use upstream::{Invalidate, Upstream, UpstreamConfig};
