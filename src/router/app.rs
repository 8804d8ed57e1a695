//! The application routes are materialized into.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::Router;
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::error::Result;
use crate::http::body::{body_parser_middleware, BodyParser};
use crate::observability::metrics::record_request;
use crate::query::escape::RoutePath;
use crate::registry::task::TaskChain;
use crate::registry::Verb;
use crate::router::dispatch::RouteTable;
use crate::router::path::{MatchMode, PathMatcher};

/// Options for `@static`, read from the options bag.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticOptions {
    /// Serve `index.html` for directory requests.
    pub index: bool,
    #[serde(alias = "precompressedGzip")]
    pub precompressed_gzip: bool,
    #[serde(alias = "precompressedBr")]
    pub precompressed_br: bool,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            index: true,
            precompressed_gzip: false,
            precompressed_br: false,
        }
    }
}

/// Which methods an entry answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Verb(Verb),
}

impl MethodFilter {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Verb(Verb::Get) => *method == Method::GET || *method == Method::HEAD,
            MethodFilter::Verb(verb) => *method == verb.method(),
        }
    }
}

/// A param chain bound on a path router.
#[derive(Debug, Clone)]
pub struct ParamBinding {
    pub name: String,
    pub chain: TaskChain,
}

pub(crate) enum EntryHandler {
    Tasks {
        chain: TaskChain,
        params: Arc<[ParamBinding]>,
    },
    Static {
        service: ServeDir,
    },
}

/// One layer of the application stack.
pub struct RouteEntry {
    pub(crate) matcher: PathMatcher,
    pub(crate) method: MethodFilter,
    pub(crate) handler: EntryHandler,
    label: String,
}

impl RouteEntry {
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Router scoped to one path: param chains plus one chain per verb.
#[derive(Debug, Clone)]
pub struct PathRouter {
    path: RoutePath,
    params: Vec<ParamBinding>,
    routes: Vec<(Verb, TaskChain)>,
}

impl PathRouter {
    pub fn new(path: RoutePath) -> Self {
        Self {
            path,
            params: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    /// Run `chain` whenever a route of this router captures `name`.
    pub fn param(&mut self, name: &str, chain: TaskChain) -> &mut Self {
        self.params.push(ParamBinding {
            name: name.to_string(),
            chain,
        });
        self
    }

    pub fn route(&mut self, verb: Verb, chain: TaskChain) -> &mut Self {
        self.routes.push((verb, chain));
        self
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn routes(&self) -> &[(Verb, TaskChain)] {
        &self.routes
    }
}

/// Ordered stack of route entries and body parsers, matched the way an
/// express application matches its layers.
#[derive(Default)]
pub struct App {
    entries: Vec<RouteEntry>,
    body_parsers: Vec<BodyParser>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `chain` for every request under `mount`, any method.
    pub fn use_tasks(&mut self, mount: &str, chain: TaskChain) -> Result<&mut Self> {
        let matcher = PathMatcher::compile(&RoutePath::Literal(mount.to_string()), MatchMode::Mount)?;
        let label = format!("USE {} -> {}", mount, chain.names().join(" -> "));
        self.push(matcher, MethodFilter::Any, tasks_handler(chain, Vec::new()), label);
        Ok(self)
    }

    pub fn use_body_parser(&mut self, parser: BodyParser) -> &mut Self {
        tracing::debug!(parser = %parser.kind(), content_type = %parser.content_type(), "Installed body parser");
        self.body_parsers.push(parser);
        self
    }

    /// Serve files under `root` for GET and HEAD requests below `mount`.
    pub fn serve_static(
        &mut self,
        mount: &str,
        root: impl Into<PathBuf>,
        options: &StaticOptions,
    ) -> Result<&mut Self> {
        let root = root.into();
        let matcher = PathMatcher::compile(&RoutePath::Literal(mount.to_string()), MatchMode::Mount)?;
        let mut service = ServeDir::new(&root).append_index_html_on_directories(options.index);
        if options.precompressed_gzip {
            service = service.precompressed_gzip();
        }
        if options.precompressed_br {
            service = service.precompressed_br();
        }
        let label = format!("STATIC {} -> {}", mount, root.display());
        tracing::debug!(mount = %mount, root = %root.display(), "Serving static files");
        self.push(matcher, MethodFilter::Any, EntryHandler::Static { service }, label);
        Ok(self)
    }

    /// Bind `chain` for every method on `path`.
    pub fn all(&mut self, path: &RoutePath, chain: TaskChain) -> Result<&mut Self> {
        let matcher = PathMatcher::compile(path, MatchMode::Route)?;
        let label = format!("ALL {} -> {}", path, chain.names().join(" -> "));
        self.push(matcher, MethodFilter::Any, tasks_handler(chain, Vec::new()), label);
        Ok(self)
    }

    /// Add every verb route of `router`, carrying its param chains along.
    pub fn mount(&mut self, router: PathRouter) -> Result<&mut Self> {
        let matcher = PathMatcher::compile(&router.path, MatchMode::Route)?;
        let params: Arc<[ParamBinding]> = router.params.into();
        for (verb, chain) in router.routes {
            let mut label = format!("{} {} -> {}", verb, router.path, chain.names().join(" -> "));
            for binding in params.iter() {
                label.push_str(&format!(
                    " [param {}: {}]",
                    binding.name,
                    binding.chain.names().join(" -> ")
                ));
            }
            self.push(
                matcher.clone(),
                MethodFilter::Verb(verb),
                EntryHandler::Tasks {
                    chain,
                    params: params.clone(),
                },
                label,
            );
        }
        Ok(self)
    }

    /// Append everything `other` holds, keeping its order.
    pub fn extend(&mut self, other: App) -> &mut Self {
        self.entries.extend(other.entries);
        self.body_parsers.extend(other.body_parsers);
        self
    }

    pub fn route_count(&self) -> usize {
        self.entries.len()
    }

    pub fn body_parser_count(&self) -> usize {
        self.body_parsers.len()
    }

    /// One line per entry, in match order.
    pub fn describe(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    /// Freeze the entries into a dispatch table, dropping body parsers.
    #[cfg(test)]
    pub(crate) fn into_route_table(self) -> RouteTable {
        RouteTable::new(self.entries)
    }

    /// Build the axum router: body parsers in registration order around a
    /// fallback that dispatches through the entry stack.
    pub fn into_router(self) -> Router {
        let table = Arc::new(RouteTable::new(self.entries));
        let mut router = Router::new().fallback(move |req: Request| {
            let table = table.clone();
            async move {
                let start = Instant::now();
                let method = req.method().clone();
                let response = table.dispatch(req).await;
                record_request(&method, response.status(), start);
                response
            }
        });
        for parser in self.body_parsers.into_iter().rev() {
            router = router.layer(from_fn_with_state(parser, body_parser_middleware));
        }
        router
    }

    fn push(&mut self, matcher: PathMatcher, method: MethodFilter, handler: EntryHandler, label: String) {
        tracing::debug!(route = %label, "Registered route");
        self.entries.push(RouteEntry {
            matcher,
            method,
            handler,
            label,
        });
    }
}

fn tasks_handler(chain: TaskChain, params: Vec<ParamBinding>) -> EntryHandler {
    EntryHandler::Tasks {
        chain,
        params: params.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Next, SharedContext, Task};
    use axum::response::{IntoResponse, Response};

    async fn foo(_ctx: SharedContext, _req: Request, _next: Next) -> Response {
        "foo".into_response()
    }

    fn chain() -> TaskChain {
        TaskChain::new(vec![Task::from_fn(foo).unwrap()], SharedContext::new())
    }

    #[test]
    fn test_method_filter() {
        assert!(MethodFilter::Verb(Verb::Get).allows(&Method::HEAD));
        assert!(!MethodFilter::Verb(Verb::Post).allows(&Method::GET));
        assert!(MethodFilter::Any.allows(&Method::OPTIONS));
    }

    #[test]
    fn test_mount_flattens_verbs_in_order() {
        let mut router = PathRouter::new(RoutePath::Literal("/user/:id".into()));
        router.param("id", chain()).route(Verb::Get, chain()).route(Verb::Delete, chain());
        let mut app = App::new();
        app.mount(router).unwrap();
        assert_eq!(
            app.describe(),
            vec![
                "GET /user/:id -> foo [param id: foo]",
                "DELETE /user/:id -> foo [param id: foo]",
            ]
        );
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut a = App::new();
        a.all(&RoutePath::Literal("/a".into()), chain()).unwrap();
        let mut b = App::new();
        b.use_tasks("/", chain()).unwrap();
        b.serve_static("/public", "/tmp", &StaticOptions::default()).unwrap();
        a.extend(b);
        assert_eq!(a.route_count(), 3);
        assert!(a.describe()[2].starts_with("STATIC /public -> "));
    }

    #[test]
    fn test_bad_path_is_rejected() {
        let mut app = App::new();
        assert!(app.all(&RoutePath::Regex("(".into()), chain()).is_err());
        assert_eq!(app.route_count(), 0);
    }

    #[test]
    fn test_static_options_defaults() {
        let opts: StaticOptions = serde_json::from_value(serde_json::json!({ "precompressedGzip": true })).unwrap();
        assert!(opts.index);
        assert!(opts.precompressed_gzip);
    }
}
