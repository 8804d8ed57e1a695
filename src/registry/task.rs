//! Tasks: named async handlers chained like express middleware.
//!
//! A task receives the shared context, the request and a [`Next`] handle.
//! Calling `next.run(req)` passes control to the following task; when the
//! chain is exhausted the dispatcher keeps matching later routes, and a
//! request nobody answers ends in 404.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::{Result, XprssoError};
use crate::registry::is_identifier;
use crate::router::dispatch::RouteTable;

/// Future returned by a task.
pub type TaskFuture = BoxFuture<'static, Response>;

type TaskFn = dyn Fn(SharedContext, Request, Next) -> TaskFuture + Send + Sync;

/// Context shared by every task and hook of one `Xprsso` instance.
///
/// Cloning the handle shares the same underlying map.
#[derive(Clone, Default)]
pub struct SharedContext {
    values: Arc<DashMap<String, Value>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.remove(key).map(|(_, v)| v)
    }

    /// Replace the value under `key` with `f(current)` atomically and return
    /// the new value.
    pub fn update<F>(&self, key: impl Into<String>, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut entry = self.values.entry(key.into()).or_insert(Value::Null);
        let current = entry.value();
        let next = f((!current.is_null()).then_some(current));
        *entry.value_mut() = next.clone();
        next
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when both handles point at the same context.
    pub fn same_as(&self, other: &SharedContext) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContext")
            .field("entries", &self.values.len())
            .finish()
    }
}

/// A registered handler and the name it is looked up by.
#[derive(Clone)]
pub struct Task {
    name: Arc<str>,
    handler: Arc<TaskFn>,
}

impl Task {
    /// Create a task under an explicit name.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Result<Self>
    where
        F: Fn(SharedContext, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(XprssoError::InvalidName { what: "task", name });
        }
        Ok(Self {
            name: name.into(),
            handler: Arc::new(move |ctx: SharedContext, req: Request, next: Next| -> TaskFuture {
                f(ctx, req, next).boxed()
            }),
        })
    }

    /// Create a task named after the function item passed in.
    ///
    /// Closures and function pointers carry no name and are rejected.
    pub fn from_fn<F, Fut>(f: F) -> Result<Self>
    where
        F: Fn(SharedContext, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let name = function_name::<F>()?;
        Self::new(name, f)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, ctx: SharedContext, req: Request, next: Next) -> TaskFuture {
        (self.handler)(ctx, req, next)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.name).finish()
    }
}

/// Name of a function item from its type path, e.g. `app::tasks::hello`
/// yields `hello`.
pub fn function_name<F>() -> Result<String> {
    let full = type_name::<F>();
    let anonymous = || XprssoError::AnonymousTask {
        type_name: full.to_string(),
    };
    if full.contains("{{closure}}") || full.starts_with("fn(") || full.contains(' ') {
        return Err(anonymous());
    }
    let path = full.split('<').next().unwrap_or(full);
    let name = path.rsplit("::").next().unwrap_or(path);
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(anonymous())
    }
}

/// An ordered list of tasks bound to the context they run with.
#[derive(Clone)]
pub struct TaskChain {
    tasks: Arc<[Task]>,
    ctx: SharedContext,
}

impl TaskChain {
    pub fn new(tasks: Vec<Task>, ctx: SharedContext) -> Self {
        Self {
            tasks: tasks.into(),
            ctx,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(Task::name).collect()
    }

    /// Run the chain on its own; an exhausted chain answers 404.
    pub async fn run(&self, req: Request) -> Response {
        let steps = self.steps(None);
        Next::new(steps, Continuation::NotFound).run(req).await
    }

    pub(crate) fn steps(&self, param: Option<&PathParam>) -> impl Iterator<Item = Step> + '_ {
        let param = param.cloned();
        self.tasks.iter().map(move |task| Step {
            task: task.clone(),
            ctx: self.ctx.clone(),
            param: param.clone(),
        })
    }
}

impl fmt::Debug for TaskChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tasks.iter().map(Task::name)).finish()
    }
}

/// The route parameter a param task is running for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    pub value: String,
}

/// Every parameter captured by the matched route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(pub HashMap<String, String>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Clone)]
pub(crate) struct Step {
    pub(crate) task: Task,
    pub(crate) ctx: SharedContext,
    pub(crate) param: Option<PathParam>,
}

pub(crate) enum Continuation {
    NotFound,
    Routes {
        table: Arc<RouteTable>,
        resume_at: usize,
    },
}

/// Handle to the rest of the chain.
pub struct Next {
    steps: Arc<[Step]>,
    index: usize,
    continuation: Continuation,
}

impl Next {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>, continuation: Continuation) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            index: 0,
            continuation,
        }
    }

    /// Hand the request to the next task in line.
    pub async fn run(mut self, mut req: Request) -> Response {
        if let Some(step) = self.steps.get(self.index).cloned() {
            self.index += 1;
            match step.param {
                Some(param) => {
                    req.extensions_mut().insert(param);
                }
                None => {
                    req.extensions_mut().remove::<PathParam>();
                }
            }
            return step.task.call(step.ctx, req, self).await;
        }
        match self.continuation {
            Continuation::NotFound => StatusCode::NOT_FOUND.into_response(),
            Continuation::Routes { table, resume_at } => table.dispatch_from(req, resume_at).await,
        }
    }

    /// Tasks left in the chain, this one excluded.
    pub fn remaining(&self) -> usize {
        self.steps.len() - self.index
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("steps", &self.steps.len())
            .finish()
    }
}
