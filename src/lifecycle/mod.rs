//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting → finish in-flight requests
//!             → drain mirror deliveries (bounded) → exit
//! ```
//!
//! # Design Decisions
//! - Mirror deliveries get a bounded drain; whatever is still running at the
//!   deadline is abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::shutdown_signal;
