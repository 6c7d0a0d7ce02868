//! Candidate server descriptor.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// How long a penalty sticks before the server is considered healthy
/// again.
pub const PENALTY_TIMEOUT: Duration = Duration::from_secs(300);

/// Server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Addr {
    /// TCP endpoint.
    Tcp { host: String, port: u16 },
    /// UNIX socket (or named pipe) path.
    Socket { path: String },
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addr::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Addr::Socket { path } => write!(f, "{}", path),
        }
    }
}

#[derive(Debug, Default)]
struct Penalty {
    score: u32,
    since: Option<Instant>,
}

impl Penalty {
    fn expired(&self, now: Instant) -> bool {
        match self.since {
            Some(since) => now.duration_since(since) > PENALTY_TIMEOUT,
            None => false,
        }
    }
}

/// One candidate server: configured address, slot weight and a live
/// penalty score. Created once at upstream construction and shared for
/// the upstream's lifetime.
///
/// The penalty is only touched through selection and `invalidate`; it
/// expires after [`PENALTY_TIMEOUT`] so a recovered server regains
/// traffic without operator intervention.
#[derive(Debug)]
pub struct ServerInfo {
    addr: Addr,
    count: usize,
    penalty: Mutex<Penalty>,
}

impl ServerInfo {
    /// New server descriptor contributing `count` upstream slots.
    pub fn new(addr: Addr, count: usize) -> Self {
        Self {
            addr,
            count: count.max(1),
            penalty: Mutex::new(Penalty::default()),
        }
    }

    /// Configured address.
    pub fn addr(&self) -> &Addr {
        &self.addr
    }

    /// Number of upstream slots this server contributes.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Current penalty score. Zero means healthy.
    pub fn penalty(&self) -> u32 {
        let mut penalty = self.penalty.lock();
        if penalty.expired(Instant::now()) {
            *penalty = Penalty::default();
        }
        penalty.score
    }

    /// Sink this server in selection priority. Returns the new penalty.
    pub(crate) fn penalize(&self) -> u32 {
        let mut penalty = self.penalty.lock();
        penalty.score += 1;
        penalty.since = Some(Instant::now());
        penalty.score
    }

    /// A successful open clears the penalty so a recovered server
    /// regains traffic immediately.
    pub(crate) fn reset_penalty(&self) {
        *self.penalty.lock() = Penalty::default();
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

// Identity is the configured address, not the object.
impl PartialEq for ServerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for ServerInfo {}
