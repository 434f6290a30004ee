//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client / server / codec events
//!     → logging.rs (tracing subscriber, structured events)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing, pretty output for development
//! - Metrics go through the `metrics` facade only; without an installed
//!   recorder every call is a no-op

pub mod logging;
pub mod metrics;
