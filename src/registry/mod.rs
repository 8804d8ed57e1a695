//! Registry of everything a query may refer to.
//!
//! # Data Flow
//! ```text
//! add_task / add_options / add_descriptor
//!     → Registry (tasks, options, descriptor hooks)
//!     → schema synthesis (paths × verbs × tasks)
//!
//! set(app, query)
//!     → register_path for every path identifier
//!     → resolver_graph() handed to the engine
//!     → task / hook lookup during materialization
//! ```
//!
//! # Design Decisions
//! - One registry per `Xprsso` instance, no global state
//! - Names are schema identifiers, so the synthesized schema always parses
//! - The resolver graph is a borrowed view: every path shares the same verb
//!   node and every verb shares the same task index

pub mod hooks;
pub mod task;

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::engine::execute::{Resolved, Resolver};
use crate::error::{Result, XprssoError};
use crate::query::descriptor::Descriptor;
use crate::query::escape::{RoutePath, COLON_TOKEN};

pub use hooks::{DescriptorHook, HookScope, HookTarget};
pub use task::{Next, PathParam, RouteParams, SharedContext, Task, TaskChain};

/// HTTP verbs a path block may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Delete,
    Put,
    Patch,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Delete, Verb::Put, Verb::Patch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
        }
    }

    /// Parse an upper-case verb name as used in queries.
    pub fn from_name(name: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|v| v.as_str() == name)
    }

    pub fn method(&self) -> axum::http::Method {
        use axum::http::Method;
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Delete => Method::DELETE,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for `[_A-Za-z][_0-9A-Za-z]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Named option objects consumed by descriptor hooks.
pub type OptionsBag = IndexMap<String, Value>;

/// Tasks, paths, options and descriptor hooks known to one instance.
pub struct Registry {
    tasks: IndexMap<String, Task>,
    paths: IndexMap<String, RoutePath>,
    options: OptionsBag,
    hooks: IndexMap<String, DescriptorHook>,
    params: IndexMap<String, Descriptor>,
}

impl Registry {
    /// Create a registry holding the built-in descriptor hooks.
    pub fn new() -> Self {
        let mut hooks = IndexMap::new();
        for (name, hook) in hooks::BUILTIN {
            hooks.insert(name.to_string(), hook);
        }
        Self {
            tasks: IndexMap::new(),
            paths: IndexMap::new(),
            options: IndexMap::new(),
            hooks,
            params: IndexMap::new(),
        }
    }

    pub fn register_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(task.name()) {
            return Err(XprssoError::DuplicateTask(task.name().to_string()));
        }
        tracing::debug!(task = %task.name(), "Registered task");
        self.tasks.insert(task.name().to_string(), task);
        Ok(())
    }

    /// Register an escaped path identifier and return its decoded form.
    pub fn register_path(&mut self, identifier: &str) -> Result<&RoutePath> {
        if !is_identifier(identifier) {
            return Err(XprssoError::InvalidName {
                what: "path",
                name: identifier.to_string(),
            });
        }
        Ok(self
            .paths
            .entry(identifier.to_string())
            .or_insert_with(|| RoutePath::from_identifier(identifier)))
    }

    pub fn register_option(&mut self, name: &str, options: Value) -> Result<()> {
        if name.trim().is_empty() {
            return Err(XprssoError::InvalidName {
                what: "options",
                name: name.to_string(),
            });
        }
        if options.is_null() {
            return Err(XprssoError::MissingOptions(name.to_string()));
        }
        self.options.insert(name.to_string(), options);
        Ok(())
    }

    pub fn register_descriptor_hook(&mut self, name: &str, hook: DescriptorHook) -> Result<()> {
        if !is_identifier(name) {
            return Err(XprssoError::InvalidName {
                what: "descriptor",
                name: name.to_string(),
            });
        }
        if self.hooks.contains_key(name) {
            return Err(XprssoError::DuplicateDescriptor(name.to_string()));
        }
        self.hooks.insert(name.to_string(), hook);
        Ok(())
    }

    pub fn task(&self, name: &str) -> Result<&Task> {
        self.tasks
            .get(name)
            .ok_or_else(|| XprssoError::TaskNotFound(name.to_string()))
    }

    pub fn hook(&self, name: &str) -> Result<DescriptorHook> {
        self.hooks
            .get(name)
            .copied()
            .ok_or_else(|| XprssoError::UnknownDescriptor(name.to_string()))
    }

    /// Options registered under `name`, if any.
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    pub fn route_path(&self, identifier: &str) -> Option<&RoutePath> {
        self.paths.get(identifier)
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn has_hook(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn path_identifiers(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Param descriptors recorded so far, keyed by their escaped `:name`.
    pub fn params(&self) -> &IndexMap<String, Descriptor> {
        &self.params
    }

    /// Key a param descriptor is matched against path identifiers with.
    pub fn param_key(descriptor: &Descriptor) -> String {
        format!("{}{}", COLON_TOKEN, descriptor.value)
    }

    pub fn commit_params(&mut self, params: IndexMap<String, Descriptor>) {
        self.params = params;
    }

    /// Structural view used as the engine's root value.
    pub fn resolver_graph(&self) -> PathsNode<'_> {
        PathsNode {
            paths: &self.paths,
            verbs: VerbsNode {
                tasks: TasksNode { tasks: &self.tasks },
            },
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Root of the resolver graph: one field per registered path.
pub struct PathsNode<'a> {
    paths: &'a IndexMap<String, RoutePath>,
    verbs: VerbsNode<'a>,
}

/// Shared by every path: one field per verb.
pub struct VerbsNode<'a> {
    tasks: TasksNode<'a>,
}

/// Shared by every verb: one field per task name.
pub struct TasksNode<'a> {
    tasks: &'a IndexMap<String, Task>,
}

impl Resolver for PathsNode<'_> {
    fn resolve(&self, field: &str) -> Resolved<'_> {
        if self.paths.contains_key(field) {
            Resolved::Object(&self.verbs)
        } else {
            Resolved::Null
        }
    }
}

impl Resolver for VerbsNode<'_> {
    fn resolve(&self, field: &str) -> Resolved<'_> {
        match Verb::from_name(field) {
            Some(_) => Resolved::Object(&self.tasks),
            None => Resolved::Null,
        }
    }
}

impl Resolver for TasksNode<'_> {
    fn resolve(&self, field: &str) -> Resolved<'_> {
        match self.tasks.get_key_value(field) {
            Some((name, _)) => Resolved::Scalar(Value::String(name.clone())),
            None => Resolved::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Request;
    use axum::response::{IntoResponse, Response};

    async fn foo(_ctx: SharedContext, _req: Request, _next: Next) -> Response {
        "foo".into_response()
    }

    fn noop_hook(_scope: &mut HookScope<'_>, _d: &Descriptor) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_verbs() {
        assert_eq!(Verb::from_name("GET"), Some(Verb::Get));
        assert_eq!(Verb::from_name("get"), None);
        assert_eq!(Verb::Patch.to_string(), "PATCH");
        assert_eq!(Verb::Delete.method(), axum::http::Method::DELETE);
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("_slash_api"));
        assert!(is_identifier("foo2"));
        assert!(!is_identifier("2foo"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_duplicate_task_leaves_table_unchanged() {
        let mut registry = Registry::new();
        registry.register_task(Task::from_fn(foo).unwrap()).unwrap();
        let err = registry.register_task(Task::from_fn(foo).unwrap()).unwrap_err();
        assert!(matches!(err, XprssoError::DuplicateTask(ref n) if n == "foo"));
        assert_eq!(registry.task_names().collect::<Vec<_>>(), vec!["foo"]);
    }

    #[test]
    fn test_register_path_decodes() {
        let mut registry = Registry::new();
        let path = registry.register_path("_slash_api").unwrap().clone();
        assert_eq!(path, RoutePath::Literal("/api".into()));
        registry.register_path("_slash_api").unwrap();
        assert_eq!(registry.path_identifiers().count(), 1);
    }

    #[test]
    fn test_options_validation() {
        let mut registry = Registry::new();
        registry
            .register_option("foo", serde_json::json!({ "bar": "baz" }))
            .unwrap();
        assert!(registry.has_option("foo"));
        assert!(matches!(
            registry.register_option("", serde_json::json!({})),
            Err(XprssoError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.register_option("x", Value::Null),
            Err(XprssoError::MissingOptions(_))
        ));
    }

    #[test]
    fn test_descriptor_hooks() {
        let mut registry = Registry::new();
        for builtin in ["param", "static", "all", "json", "raw", "text", "urlencoded"] {
            assert!(registry.has_hook(builtin), "missing {builtin}");
        }
        registry.register_descriptor_hook("bar", noop_hook).unwrap();
        assert!(registry.has_hook("bar"));
        assert!(matches!(
            registry.register_descriptor_hook("bar", noop_hook),
            Err(XprssoError::DuplicateDescriptor(_))
        ));
        assert!(matches!(
            registry.register_descriptor_hook("  ", noop_hook),
            Err(XprssoError::InvalidName { .. })
        ));
        assert!(matches!(registry.hook("nope"), Err(XprssoError::UnknownDescriptor(_))));
    }

    #[test]
    fn test_resolver_graph_is_structural() {
        let mut registry = Registry::new();
        registry.register_task(Task::from_fn(foo).unwrap()).unwrap();
        registry.register_path("_slash_").unwrap();
        let graph = registry.resolver_graph();

        let Resolved::Object(verbs) = graph.resolve("_slash_") else {
            panic!("path should resolve to an object");
        };
        let Resolved::Object(tasks) = verbs.resolve("POST") else {
            panic!("verb should resolve to an object");
        };
        assert!(matches!(tasks.resolve("foo"), Resolved::Scalar(Value::String(ref s)) if s == "foo"));
        assert!(matches!(tasks.resolve("bar"), Resolved::Null));
        assert!(matches!(graph.resolve("_slash_api"), Resolved::Null));
    }
}
