//! Configuration: connection strings, server descriptors and file loading.
//!
//! A connection string is a `;`-separated list of `key=value` entries.
//! The `master` and `slave` values are `,`-separated server lists, each
//! entry a `host[:port][#count]` spec (or an absolute socket path). The
//! same keys can come from a TOML file instead.

pub mod error;

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::backend::Addr;

pub use error::Error;

pub static DEFAULT_HOST: &str = "localhost";
pub static DEFAULT_PORT: u16 = 3306;

/// Load balancing strategy for servers of equal health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    #[default]
    RoundRobin,
    Random,
}

/// One configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket_name: Option<String>,
    /// Number of pool slots this server contributes.
    pub count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            socket_name: None,
            count: 1,
        }
    }
}

impl ServerConfig {
    /// Parse a `host[:port][#count]` spec. A leading `/` makes the spec
    /// a socket path instead.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::InvalidServer(spec.into()));
        }

        let (endpoint, count) = match spec.split_once('#') {
            Some((endpoint, count)) => {
                let count = count
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidCount(spec.into()))?;
                if count == 0 {
                    return Err(Error::InvalidCount(spec.into()));
                }
                (endpoint, count)
            }
            None => (spec, 1),
        };

        if endpoint.starts_with('/') {
            return Ok(Self {
                socket_name: Some(endpoint.into()),
                count,
                ..Default::default()
            });
        }

        let (host, port) = match endpoint.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidPort(spec.into()))?;
                (host, Some(port))
            }
            None => (endpoint, None),
        };
        if host.is_empty() {
            return Err(Error::InvalidServer(spec.into()));
        }

        Ok(Self {
            host: Some(host.into()),
            port,
            count,
            ..Default::default()
        })
    }

    /// The address to dial, defaults filled in.
    pub fn addr(&self) -> Addr {
        match &self.socket_name {
            Some(path) => Addr::Socket { path: path.clone() },
            None => Addr::Tcp {
                host: self
                    .host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: self.port.unwrap_or(DEFAULT_PORT),
            },
        }
    }
}

/// Parse a `,`-separated server list.
pub fn parse_server_list(list: &str) -> Result<Vec<ServerConfig>, Error> {
    list.split(',').map(ServerConfig::parse).collect()
}

/// Connection arguments, from a connection string or a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectArgs {
    /// Writable servers, as a server list.
    #[serde(default)]
    pub master: Option<String>,
    /// Read-only servers, as a server list.
    #[serde(default)]
    pub slave: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Host for a plain single-server connection.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub socket_name: Option<String>,
    /// Driver-specific entries, passed through untouched.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ConnectArgs {
    /// Parse a `key=value;...` connection string.
    pub fn parse_connection_string(value: &str) -> Result<Self, Error> {
        let mut args = Self::default();

        for entry in value.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::InvalidEntry(entry.into()))?;

            match key.trim() {
                "master" => args.master = Some(value.into()),
                "slave" => args.slave = Some(value.into()),
                "database" => args.database = Some(value.into()),
                "host" => args.host = Some(value.into()),
                "port" => {
                    args.port = Some(
                        value
                            .parse::<u16>()
                            .map_err(|_| Error::InvalidPort(entry.into()))?,
                    )
                }
                "socket_name" => args.socket_name = Some(value.into()),
                key => {
                    args.extra.insert(key.into(), value.into());
                }
            }
        }

        Ok(args)
    }

    /// Writable servers.
    pub fn master_servers(&self) -> Result<Vec<ServerConfig>, Error> {
        match &self.master {
            Some(list) => parse_server_list(list),
            None => Ok(vec![]),
        }
    }

    /// Read-only servers.
    pub fn slave_servers(&self) -> Result<Vec<ServerConfig>, Error> {
        match &self.slave {
            Some(list) => parse_server_list(list),
            None => Ok(vec![]),
        }
    }

    /// The single-server fallback used when no server lists are given.
    pub fn default_server(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            socket_name: self.socket_name.clone(),
            count: 1,
        }
    }
}

impl FromStr for ConnectArgs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_connection_string(s)
    }
}

/// Load connection arguments from a TOML file.
pub fn load(path: impl AsRef<Path>) -> Result<ConnectArgs, Error> {
    let path = path.as_ref();
    let args = toml::from_str(&std::fs::read_to_string(path)?)?;
    info!("loaded configuration from {}", path.display());
    Ok(args)
}
