//! Observability for the page render worker.
//!
//! This crate provides:
//! - `init_logging` - Global `tracing` subscriber from `LoggingSettings`
//! - `MetricsCollector` / `RequestMetrics` - Per-request render timings

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export RequestId and TimingContext from page-core for convenience
pub use page_core::{RequestId, TimingContext};
