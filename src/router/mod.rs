//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Materialization (per `set`):
//!     validated query data + descriptors
//!     → materialize.rs (descriptor hooks, one PathRouter per path)
//!     → app.rs (ordered entry stack, body parsers)
//!     → path.rs (compile express paths and regex routes)
//!
//! Incoming Request:
//!     → body parsers (content type match, buffer, parse)
//!     → dispatch.rs (first matching entry, param chains, verb chain)
//!     → next.run() past the last task resumes matching
//!     → 404 when nothing answers
//! ```
//!
//! # Design Decisions
//! - Entries are matched in registration order, the way express matches
//!   its layer stack; there is no priority sorting
//! - Routes are compiled when they are added, never per request
//! - A materialization either appends all of its entries or none

pub mod app;
pub mod dispatch;
pub mod materialize;
pub mod path;

pub use app::{App, MethodFilter, PathRouter, StaticOptions};
pub use dispatch::RouteTable;
pub use materialize::{Materialized, Materializer};
pub use path::{MatchMode, PathMatch, PathMatcher};
