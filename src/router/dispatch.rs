//! Request dispatch through the ordered entry stack.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::future::{BoxFuture, FutureExt};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::registry::task::{Continuation, Next, PathParam, RouteParams, Step, TaskChain};
use crate::router::app::{EntryHandler, ParamBinding, RouteEntry};
use crate::router::path::PathMatch;

/// Frozen entry stack shared by every in-flight request.
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dispatch(self: Arc<Self>, req: Request) -> BoxFuture<'static, Response> {
        self.dispatch_from(req, 0)
    }

    /// Match `req` against entries from `start` on. A task chain that runs
    /// out hands the request back here to resume after its own entry.
    pub fn dispatch_from(self: Arc<Self>, mut req: Request, start: usize) -> BoxFuture<'static, Response> {
        async move {
            let path = req.uri().path().to_string();
            for index in start..self.entries.len() {
                let entry = &self.entries[index];
                if !entry.method.allows(req.method()) {
                    continue;
                }
                let Some(hit) = entry.matcher.matches(&path) else {
                    continue;
                };
                match &entry.handler {
                    EntryHandler::Tasks { chain, params } => {
                        tracing::trace!(route = %entry.label(), "Matched route");
                        req.extensions_mut()
                            .insert(RouteParams(hit.params.iter().cloned().collect()));
                        let steps = build_steps(chain, params, &hit);
                        let continuation = Continuation::Routes {
                            table: self.clone(),
                            resume_at: index + 1,
                        };
                        return Next::new(steps, continuation).run(req).await;
                    }
                    EntryHandler::Static { service } => {
                        match serve_static(service.clone(), req, hit.end).await {
                            Ok(response) => return response,
                            Err(unserved) => req = unserved,
                        }
                    }
                }
            }
            StatusCode::NOT_FOUND.into_response()
        }
        .boxed()
    }
}

/// Param chains for every captured parameter, in capture order, then the
/// route's own chain.
fn build_steps(chain: &TaskChain, params: &[ParamBinding], hit: &PathMatch) -> Vec<Step> {
    let mut steps = Vec::new();
    for (name, value) in &hit.params {
        let current = PathParam {
            name: name.clone(),
            value: value.clone(),
        };
        for binding in params.iter().filter(|b| &b.name == name) {
            steps.extend(binding.chain.steps(Some(&current)));
        }
    }
    steps.extend(chain.steps(None));
    steps
}

/// Try to answer `req` from a static directory. The request comes back
/// untouched when the method is not GET/HEAD or the file does not exist.
async fn serve_static(service: ServeDir, req: Request, mount_end: usize) -> Result<Response, Request> {
    if *req.method() != Method::GET && *req.method() != Method::HEAD {
        return Err(req);
    }
    let rest = &req.uri().path()[mount_end..];
    let rest = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    };
    let target = match req.uri().query() {
        Some(query) => format!("{}?{}", rest, query),
        None => rest,
    };
    let Ok(uri) = target.parse::<Uri>() else {
        return Err(req);
    };

    let mut inner = Request::new(Body::empty());
    *inner.method_mut() = req.method().clone();
    *inner.uri_mut() = uri;
    *inner.headers_mut() = req.headers().clone();

    match service.oneshot(inner).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => {
            Ok(response.map(Body::new).into_response())
        }
        _ => Err(req),
    }
}
