//! The system instance: registration API plus `set`.
//!
//! # Data Flow
//! ```text
//! set(app, query or file)
//!     → load_source          (file contents, or the text itself)
//!     → parse_descriptors    (on the annotated text as loaded)
//!     → normalize            (comments, descriptors stripped, escaped)
//!     → register_path        (every path identifier found)
//!     → Schema::synthesize
//!     → execute_validated    (schema + query + resolver graph)
//!     → Materializer::apply  (staged, appended to app on success)
//!     → ReadySignal::emit
//! ```
//!
//! # Design Decisions
//! - `set` is synchronous: the engine runs in-process, so the result is
//!   known on return and the ready event has already been sent
//! - Every failure returns before `app` is touched and before any ready
//!   event; paths registered by a failed call stay registered
//! - The schema is re-synthesized after every task or path mutation

use std::fmt;
use std::future::Future;
use std::path::Path;

use axum::extract::Request;
use axum::response::Response;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::engine::execute_validated;
use crate::error::{Result, XprssoError};
use crate::lifecycle::{Ready, ReadySignal};
use crate::observability::metrics::{record_materialized, record_query};
use crate::query::descriptor::parse_descriptors;
use crate::query::normalize::{extract_path_identifiers, load_source, normalize, read_query_file};
use crate::registry::{DescriptorHook, Next, Registry, SharedContext, Task};
use crate::router::materialize::Materializer;
use crate::router::App;
use crate::schema::Schema;

/// One declarative routing instance. Owns its registry; nothing is shared
/// between instances.
pub struct Xprsso {
    registry: Registry,
    schema: Schema,
    context: SharedContext,
    ready: ReadySignal,
}

impl Xprsso {
    pub fn new() -> Self {
        Self::with_context(SharedContext::new())
    }

    /// Create an instance whose tasks and hooks share `context`.
    pub fn with_context(context: SharedContext) -> Self {
        let registry = Registry::new();
        let schema = Schema::synthesize(&registry);
        Self {
            registry,
            schema,
            context,
            ready: ReadySignal::new(),
        }
    }

    /// Read a query file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<String> {
        read_query_file(path)
    }

    /// Register a task under its function name.
    ///
    /// ```ignore
    /// async fn hello(ctx: SharedContext, req: Request, next: Next) -> Response { ... }
    /// xprsso.add_task(hello)?;
    /// ```
    pub fn add_task<F, Fut>(&mut self, f: F) -> Result<&mut Self>
    where
        F: Fn(SharedContext, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let task = Task::from_fn(f)?;
        self.insert_task(task)
    }

    /// Register a task, closures included, under an explicit name.
    pub fn add_named_task<F, Fut>(&mut self, name: &str, f: F) -> Result<&mut Self>
    where
        F: Fn(SharedContext, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let task = Task::new(name, f)?;
        self.insert_task(task)
    }

    /// Store a named options object for descriptor hooks.
    pub fn add_options<T: Serialize>(&mut self, name: &str, options: T) -> Result<&mut Self> {
        let value = serde_json::to_value(options).map_err(|source| XprssoError::InvalidOptions {
            name: name.to_string(),
            source,
        })?;
        self.registry.register_option(name, value)?;
        tracing::debug!(options = %name, "Registered options");
        Ok(self)
    }

    /// Register a descriptor hook under `name`, usable as `@name` in queries.
    pub fn add_descriptor(&mut self, name: &str, hook: DescriptorHook) -> Result<&mut Self> {
        self.registry.register_descriptor_hook(name, hook)?;
        tracing::debug!(descriptor = %name, "Registered descriptor hook");
        Ok(self)
    }

    /// Apply a query, given as text or as a file path, to `app`.
    ///
    /// On success the routes are appended to `app` and one ready event is
    /// sent. On failure `app` is unchanged and no event is sent.
    pub fn set(&mut self, app: &mut App, query: &str) -> Result<&mut Self> {
        match self.apply(app, query) {
            Ok(ready) => {
                record_query("applied");
                tracing::info!(generation = ready.generation, paths = ?ready.paths, "Query applied");
                Ok(self)
            }
            Err(e) => {
                record_query("failed");
                tracing::error!(error = %e, "Query was not applied");
                Err(e)
            }
        }
    }

    fn apply(&mut self, app: &mut App, query: &str) -> Result<Ready> {
        let raw = load_source(query)?;
        let descriptors = parse_descriptors(&raw)?;
        let safe = normalize(&raw)?;
        let identifiers = extract_path_identifiers(&safe)?;

        for identifier in &identifiers {
            let path = self.registry.register_path(identifier)?;
            tracing::debug!(identifier = %identifier, path = %path, "Registered path");
        }
        self.refresh_schema();

        let data = execute_validated(&self.schema, &safe, &self.registry.resolver_graph())?;
        let materialized = Materializer::new(&self.registry, &self.context).apply(app, &data, &descriptors)?;

        let paths = materialized
            .paths
            .iter()
            .filter_map(|id| self.registry.route_path(id))
            .map(ToString::to_string)
            .collect();
        record_materialized(materialized.routes);
        self.registry.commit_params(materialized.params);
        Ok(self.ready.emit(paths))
    }

    /// Subscribe to ready events of later `set` calls.
    pub fn on_ready(&self) -> broadcast::Receiver<Ready> {
        self.ready.subscribe()
    }

    /// Successful `set` calls so far.
    pub fn generation(&self) -> u64 {
        self.ready.generation()
    }

    /// The schema as of the last task or path mutation.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.registry.has_task(name)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.registry.has_option(name)
    }

    pub fn has_descriptor(&self, name: &str) -> bool {
        self.registry.has_hook(name)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.registry.task_names().collect()
    }

    /// Registered path identifiers, in registration order.
    pub fn paths(&self) -> Vec<&str> {
        self.registry.path_identifiers().collect()
    }

    fn insert_task(&mut self, task: Task) -> Result<&mut Self> {
        self.registry.register_task(task)?;
        self.refresh_schema();
        Ok(self)
    }

    fn refresh_schema(&mut self) {
        self.schema = Schema::synthesize(&self.registry);
        tracing::trace!(
            paths = self.schema.paths().len(),
            tasks = self.schema.tasks().len(),
            "Schema synthesized"
        );
    }
}

impl fmt::Debug for Xprsso {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xprsso")
            .field("tasks", &self.schema.tasks().len())
            .field("paths", &self.schema.paths().len())
            .field("generation", &self.ready.generation())
            .finish()
    }
}

impl Default for Xprsso {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::descriptor::Descriptor;
    use crate::registry::HookScope;
    use axum::response::IntoResponse;

    async fn foo(_ctx: SharedContext, _req: Request, _next: Next) -> Response {
        "foo".into_response()
    }

    fn noop(_scope: &mut HookScope<'_>, _d: &Descriptor) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_add_task_updates_schema() {
        let mut xprsso = Xprsso::new();
        assert!(xprsso.schema().tasks().is_empty());
        xprsso.add_task(foo).unwrap();
        assert_eq!(xprsso.schema().tasks(), ["foo"]);
        assert!(xprsso.has_task("foo"));
    }

    #[test]
    fn test_anonymous_task_is_rejected_before_schema_changes() {
        let mut xprsso = Xprsso::new();
        let err = xprsso
            .add_task(|_ctx: SharedContext, _req: Request, _next: Next| async { "x".into_response() })
            .unwrap_err();
        assert!(matches!(err, XprssoError::AnonymousTask { .. }));
        assert!(xprsso.schema().tasks().is_empty());

        xprsso
            .add_named_task("closure", |_ctx: SharedContext, _req: Request, _next: Next| async {
                "x".into_response()
            })
            .unwrap();
        assert_eq!(xprsso.task_names(), vec!["closure"]);
    }

    #[test]
    fn test_options_and_descriptors() {
        let mut xprsso = Xprsso::new();
        xprsso
            .add_options("jsonOpts", serde_json::json!({ "limit": "1mb" }))
            .unwrap()
            .add_descriptor("noop", noop)
            .unwrap();
        assert!(xprsso.has_option("jsonOpts"));
        assert!(xprsso.has_descriptor("noop"));
        assert!(xprsso.has_descriptor("static"));
        assert!(matches!(
            xprsso.add_descriptor("noop", noop),
            Err(XprssoError::DuplicateDescriptor(_))
        ));
    }

    #[test]
    fn test_set_registers_paths_and_emits_ready() {
        let mut xprsso = Xprsso::new();
        xprsso.add_task(foo).unwrap();
        let mut ready = xprsso.on_ready();
        let mut app = App::new();
        xprsso.set(&mut app, "{ / { GET { foo } } /api { POST { foo } } }").unwrap();

        assert_eq!(xprsso.paths(), vec!["_slash_", "_slash_api"]);
        assert_eq!(xprsso.schema().paths(), ["_slash_", "_slash_api"]);
        assert_eq!(app.route_count(), 2);
        let event = ready.try_recv().unwrap();
        assert_eq!(event.generation, 1);
        assert_eq!(event.paths, vec!["/", "/api"]);
        assert!(ready.try_recv().is_err());
    }

    #[test]
    fn test_failed_set_sends_nothing() {
        let mut xprsso = Xprsso::new();
        xprsso.add_task(foo).unwrap();
        let mut ready = xprsso.on_ready();
        let mut app = App::new();

        let err = xprsso.set(&mut app, "{ / { GET { bar } } }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(app.route_count(), 0);
        assert_eq!(xprsso.generation(), 0);
        assert!(ready.try_recv().is_err());
    }

    #[test]
    fn test_query_without_paths() {
        let mut xprsso = Xprsso::new();
        let mut app = App::new();
        assert!(matches!(xprsso.set(&mut app, "{ }"), Err(XprssoError::NoPaths)));
        assert!(matches!(xprsso.set(&mut app, "  "), Err(XprssoError::EmptyQuery)));
    }

    #[test]
    fn test_descriptors_read_from_annotated_text() {
        let mut xprsso = Xprsso::new();
        xprsso.add_task(foo).unwrap();
        let mut app = App::new();
        xprsso
            .set(&mut app, "# catch-all: @all /*: foo\n{ / { GET { foo } } }")
            .unwrap();
        assert_eq!(app.describe(), vec!["ALL /* -> foo", "GET / -> foo"]);
    }

    #[test]
    fn test_debug_shows_counts() {
        let mut xprsso = Xprsso::new();
        xprsso.add_task(foo).unwrap();
        assert_eq!(
            format!("{:?}", xprsso),
            "Xprsso { tasks: 1, paths: 0, generation: 0 }"
        );
    }
}
