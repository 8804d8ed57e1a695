//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Ready (ready.rs):
//!     set() succeeds → ReadySignal::emit → every on_ready() subscriber
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Ctrl+C / SIGTERM → Shutdown::trigger → server stops accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - One ready event per successful `set`, none for a failed one
//! - Ready is a broadcast: every subscriber sees every event
//! - Shutdown is a sticky flag, so a late waiter still stops

pub mod ready;
pub mod shutdown;
pub mod signals;

pub use ready::{Ready, ReadySignal};
pub use shutdown::Shutdown;
