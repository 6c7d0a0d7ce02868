//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed entry \"{0}\", expected key=value")]
    InvalidEntry(String),

    #[error("malformed server \"{0}\"")]
    InvalidServer(String),

    #[error("invalid port in \"{0}\"")]
    InvalidPort(String),

    #[error("invalid connection count in \"{0}\"")]
    InvalidCount(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Toml(#[from] toml::de::Error),
}
