//! Bounded connection pool over an upstream.

pub mod comms;
pub mod guard;
pub mod inner;
pub mod pool;
pub mod state;
pub mod waiting;

pub use guard::Guard;
pub use pool::Pool;
pub use state::State;

use comms::Comms;
use inner::Inner;
use waiting::Waiting;
