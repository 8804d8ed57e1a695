//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Query pipeline and dispatcher produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
