//! HTTP surface of a materialized application.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, trace + timeout layers, graceful shutdown)
//!     → body.rs (parsers installed by @json / @raw / @text / @urlencoded)
//!     → router::dispatch (ordered entries, task chains)
//!     → tasks.rs (stock tasks the demo server registers)
//! ```

pub mod body;
pub mod server;
pub mod tasks;

pub use body::{BodyKind, BodyParser, BodyParserOptions, ParsedBody};
pub use server::HttpServer;
