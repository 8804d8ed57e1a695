//! Descriptor hooks.
//!
//! A hook is a plain function pointer. It cannot close over a context of
//! its own: everything it may touch (the target app or router, the options
//! bag, the task table and the shared context) arrives through the
//! [`HookScope`] it is invoked with.

use serde::de::DeserializeOwned;

use crate::error::{Result, XprssoError};
use crate::http::body::{BodyKind, BodyParser, BodyParserOptions};
use crate::query::descriptor::Descriptor;
use crate::query::escape::{encode, RoutePath};
use crate::registry::task::{SharedContext, Task, TaskChain};
use crate::registry::Registry;
use crate::router::app::{App, PathRouter, StaticOptions};

/// Signature every descriptor hook has.
pub type DescriptorHook = fn(&mut HookScope<'_>, &Descriptor) -> Result<()>;

pub(crate) const BUILTIN: [(&str, DescriptorHook); 7] = [
    ("param", param),
    ("static", serve_static),
    ("all", all),
    ("json", json),
    ("raw", raw),
    ("text", text),
    ("urlencoded", urlencoded),
];

/// What a hook is applied to.
pub enum HookTarget<'a> {
    /// The application, for descriptors that install middleware or routes.
    App(&'a mut App),
    /// The router of a single path, for `@param`.
    Router(&'a mut PathRouter),
}

/// Everything a hook invocation can reach.
pub struct HookScope<'a> {
    target: HookTarget<'a>,
    registry: &'a Registry,
    context: &'a SharedContext,
}

impl<'a> HookScope<'a> {
    pub fn new(target: HookTarget<'a>, registry: &'a Registry, context: &'a SharedContext) -> Self {
        Self {
            target,
            registry,
            context,
        }
    }

    /// The application, or an error when the hook runs against a router.
    pub fn app(&mut self, descriptor: &str) -> Result<&mut App> {
        match &mut self.target {
            HookTarget::App(app) => Ok(&mut **app),
            HookTarget::Router(_) => Err(XprssoError::HookTarget {
                descriptor: descriptor.to_string(),
                target: "a path router",
            }),
        }
    }

    /// The path router, or an error when the hook runs against the app.
    pub fn router(&mut self, descriptor: &str) -> Result<&mut PathRouter> {
        match &mut self.target {
            HookTarget::Router(router) => Ok(&mut **router),
            HookTarget::App(_) => Err(XprssoError::HookTarget {
                descriptor: descriptor.to_string(),
                target: "the application",
            }),
        }
    }

    pub fn context(&self) -> &SharedContext {
        self.context
    }

    /// Raw options registered under `name`.
    pub fn options(&self, name: &str) -> Option<&serde_json::Value> {
        self.registry.option(name)
    }

    /// Options registered under `name`, deserialized; defaults when absent.
    pub fn typed_options<T>(&self, name: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.registry.option(name) {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|source| XprssoError::InvalidOptions {
                    name: name.to_string(),
                    source,
                })
            }
            None => {
                tracing::debug!(options = %name, "No options registered, using defaults");
                Ok(T::default())
            }
        }
    }

    pub fn task(&self, name: &str) -> Result<Task> {
        self.registry.task(name).cloned()
    }

    /// Resolve task names into a chain bound to the shared context.
    pub fn chain(&self, names: &[String]) -> Result<TaskChain> {
        let tasks = names
            .iter()
            .map(|name| self.task(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(TaskChain::new(tasks, self.context.clone()))
    }
}

fn param(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    let chain = scope.chain(&descriptor.args)?;
    scope
        .router(&descriptor.name)?
        .param(&descriptor.value, chain);
    Ok(())
}

fn serve_static(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    let missing = |argument| XprssoError::MissingDescriptorArgument {
        descriptor: descriptor.name.clone(),
        argument,
    };
    let options: StaticOptions = scope.typed_options(&descriptor.value)?;
    let mount = descriptor.args.first().ok_or_else(|| missing("mount path"))?;
    let root = descriptor.args.get(1).ok_or_else(|| missing("root"))?;
    let root = std::env::current_dir()?.join(root);
    scope
        .app(&descriptor.name)?
        .serve_static(mount, root, &options)?;
    Ok(())
}

fn all(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    let chain = scope.chain(&descriptor.args)?;
    let path = RoutePath::from_identifier(&encode(&descriptor.value));
    scope.app(&descriptor.name)?.all(&path, chain)?;
    Ok(())
}

fn body_parser(scope: &mut HookScope<'_>, descriptor: &Descriptor, kind: BodyKind) -> Result<()> {
    let options: BodyParserOptions = scope.typed_options(&descriptor.value)?;
    scope
        .app(&descriptor.name)?
        .use_body_parser(BodyParser::new(kind, options));
    Ok(())
}

fn json(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    body_parser(scope, descriptor, BodyKind::Json)
}

fn raw(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    body_parser(scope, descriptor, BodyKind::Raw)
}

fn text(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    body_parser(scope, descriptor, BodyKind::Text)
}

fn urlencoded(scope: &mut HookScope<'_>, descriptor: &Descriptor) -> Result<()> {
    body_parser(scope, descriptor, BodyKind::UrlEncoded)
}
