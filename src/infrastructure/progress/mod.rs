//! Progress hub implementations

mod broadcast;
mod logging;

pub use broadcast::{BroadcastProgressHub, CompositeProgressHub};
pub use logging::LoggingProgressHub;
