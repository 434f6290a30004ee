//! Process lifecycle for the server binary.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config path → Load & validate → Init logging
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop exits → in-flight streams finish on their own
//! ```
//!
//! # Design Decisions
//! - Config is loaded before logging so the configured level applies from
//!   the first line
//! - Shutdown only stops accepting; stream tasks are not cancelled

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
