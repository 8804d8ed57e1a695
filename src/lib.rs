//! Declarative express-style routing from a GraphQL-flavored query.
//!
//! Tasks are registered by name, a query names paths, verbs and tasks, and
//! `set` validates the query against a schema synthesized from the
//! registry before binding anything on the application.
//!
//! ```ignore
//! let mut xprsso = Xprsso::new();
//! xprsso.add_task(hello)?;
//! let mut app = App::new();
//! xprsso.set(&mut app, "{ / { GET { hello } } }")?;
//! let router = app.into_router();
//! ```

// Query front end
pub mod error;
pub mod query;

// Registry and validation
pub mod engine;
pub mod registry;
pub mod schema;

// Materialization and serving
pub mod http;
pub mod router;
pub mod xprsso;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::XprssoConfig;
pub use error::{ErrorKind, Result, XprssoError};
pub use http::HttpServer;
pub use lifecycle::{Ready, Shutdown};
pub use query::descriptor::Descriptor;
pub use registry::{DescriptorHook, HookScope, Next, PathParam, RouteParams, SharedContext, Task, Verb};
pub use router::App;
pub use xprsso::Xprsso;
