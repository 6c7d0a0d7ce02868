pub mod backend;
pub mod config;
pub mod connect;
pub mod driver;

pub use backend::{
    transaction, Cluster, Connection, Error, Execute, Guard, Node, Pool, Query, QueryKind,
    Retryable, ServerInfo, Upstream,
};
pub use config::ConnectArgs;
pub use connect::{connect, connect_str, Handle};
pub use driver::{Driver, DriverConnection, DriverError};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use std::io::IsTerminal;

/// Setup the logger, so `info!`, `debug!`
/// and other macros actually output something.
///
/// Using try_init and ignoring errors to allow
/// for use in tests (setting up multiple times).
pub fn logger() {
    let format = fmt::layer()
        .with_ansi(std::io::stderr().is_terminal())
        .with_file(false);
    #[cfg(not(debug_assertions))]
    let format = format.with_target(false);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init();
}
