//! Route Materializer: validated query data in, route entries out.
//!
//! Descriptors other than `@param` fire first, against the application, in
//! source order. Then every path in the data gets its own [`PathRouter`]:
//! param descriptors whose `_colon_<name>` key occurs in the path
//! identifier are bound on it, each verb gets the chain of tasks listed
//! under it, and the router is mounted.
//!
//! Everything is built into a staging [`App`] and appended to the caller's
//! app only when the whole result applied cleanly.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Result, XprssoError};
use crate::query::descriptor::Descriptor;
use crate::registry::hooks::{HookScope, HookTarget};
use crate::registry::task::{SharedContext, TaskChain};
use crate::registry::{Registry, Verb};
use crate::router::app::{App, PathRouter};

/// Descriptor name handled per path instead of per application.
pub const PARAM_DESCRIPTOR: &str = "param";

/// What one materialization produced.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// Param descriptors known after this run, keyed by `_colon_<name>`.
    pub params: IndexMap<String, Descriptor>,
    /// Path identifiers routed, in query order.
    pub paths: Vec<String>,
    /// Route entries added to the application.
    pub routes: usize,
}

pub struct Materializer<'a> {
    registry: &'a Registry,
    context: &'a SharedContext,
}

impl<'a> Materializer<'a> {
    pub fn new(registry: &'a Registry, context: &'a SharedContext) -> Self {
        Self { registry, context }
    }

    /// Apply `descriptors` and `data` to `app`. On error `app` is left
    /// exactly as it was.
    pub fn apply(
        &self,
        app: &mut App,
        data: &Map<String, Value>,
        descriptors: &[Descriptor],
    ) -> Result<Materialized> {
        let mut staged = App::new();
        let mut params = self.registry.params().clone();

        for descriptor in descriptors {
            if descriptor.name == PARAM_DESCRIPTOR {
                params.insert(Registry::param_key(descriptor), descriptor.clone());
                continue;
            }
            let hook = self.registry.hook(&descriptor.name)?;
            let mut scope = HookScope::new(HookTarget::App(&mut staged), self.registry, self.context);
            hook(&mut scope, descriptor)?;
            tracing::debug!(descriptor = %descriptor.name, value = %descriptor.value, "Fired descriptor hook");
        }

        let param_hook = self.registry.hook(PARAM_DESCRIPTOR)?;
        let mut paths = Vec::with_capacity(data.len());
        for (identifier, verbs) in data {
            let route_path = self
                .registry
                .route_path(identifier)
                .cloned()
                .ok_or_else(|| XprssoError::InvalidName {
                    what: "path",
                    name: identifier.clone(),
                })?;
            let mut router = PathRouter::new(route_path);

            for (key, descriptor) in &params {
                if identifier.contains(key.as_str()) {
                    let mut scope =
                        HookScope::new(HookTarget::Router(&mut router), self.registry, self.context);
                    param_hook(&mut scope, descriptor)?;
                }
            }

            let Value::Object(verbs) = verbs else {
                tracing::debug!(path = %router.path(), "Path resolved to null, skipping");
                continue;
            };
            for (verb_name, tasks) in verbs {
                let Some(verb) = Verb::from_name(verb_name) else {
                    continue;
                };
                let names: Vec<String> = match tasks {
                    Value::Object(tasks) => tasks.keys().cloned().collect(),
                    _ => continue,
                };
                router.route(verb, self.chain(&names)?);
                tracing::debug!(path = %router.path(), verb = %verb, tasks = ?names, "Bound route");
            }

            staged.mount(router)?;
            paths.push(identifier.clone());
        }

        let routes = staged.route_count();
        app.extend(staged);
        Ok(Materialized {
            params,
            paths,
            routes,
        })
    }

    fn chain(&self, names: &[String]) -> Result<TaskChain> {
        let tasks = names
            .iter()
            .map(|name| self.registry.task(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(TaskChain::new(tasks, self.context.clone()))
    }
}
