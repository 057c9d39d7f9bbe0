//! Logging setup and controller counters

mod logging;
mod metrics;

pub use logging::{init_logging, is_known_format, LogConfig, LogFormat};
pub use metrics::{Counter, DropCounters, MetricsRegistry, SwitchStats};
