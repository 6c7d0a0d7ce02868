use tokio::sync::Notify;

/// Internal pool notifications.
pub(super) struct Comms {
    /// An idle connection or a reserve slot became available.
    pub(super) ready: Notify,
}

impl Comms {
    /// Create new comms.
    pub(super) fn new() -> Self {
        Self {
            ready: Notify::new(),
        }
    }
}
