//! Stock tasks registered by the demo server.
//!
//! Each one is an ordinary task function, so its name in a query is the
//! function name: `log_request`, `request_id`, `hello`, `echo_body`,
//! `show_params`.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::http::body::ParsedBody;
use crate::registry::task::{Next, PathParam, RouteParams, SharedContext};
use crate::xprsso::Xprsso;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Context key `hello` counts its calls under.
pub const HITS_KEY: &str = "hits";

/// Log the request and how long the rest of the chain took.
pub async fn log_request(_ctx: SharedContext, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}

/// Make sure the request carries an `x-request-id` and echo it on the
/// response.
pub async fn request_id(_ctx: SharedContext, mut req: Request, next: Next) -> Response {
    let id = match req.headers().get(X_REQUEST_ID) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string());
            match generated {
                Ok(value) => {
                    req.headers_mut().insert(X_REQUEST_ID, value.clone());
                    value
                }
                Err(_) => return next.run(req).await,
            }
        }
    };
    let mut response = next.run(req).await;
    response.headers_mut().insert(X_REQUEST_ID, id);
    response
}

pub async fn hello(ctx: SharedContext, _req: Request, _next: Next) -> Response {
    let hits = ctx.update(HITS_KEY, |current| {
        Value::from(current.and_then(Value::as_u64).unwrap_or(0) + 1)
    });
    Json(json!({ "message": "hello", "hits": hits })).into_response()
}

/// Answer with the parsed body, 415 when no body parser accepted it.
pub async fn echo_body(_ctx: SharedContext, req: Request, _next: Next) -> Response {
    match req.extensions().get::<ParsedBody>() {
        Some(body) => Json(body.to_json()).into_response(),
        None => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "no body parser accepted the request").into_response(),
    }
}

/// Answer with the route's captured parameters.
pub async fn show_params(_ctx: SharedContext, req: Request, _next: Next) -> Response {
    let params: serde_json::Map<String, Value> = req
        .extensions()
        .get::<RouteParams>()
        .map(|p| {
            p.0.iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect()
        })
        .unwrap_or_default();
    let current = req
        .extensions()
        .get::<PathParam>()
        .map(|p| json!({ "name": p.name, "value": p.value }));
    Json(json!({ "params": params, "param": current })).into_response()
}

/// Register every stock task on `xprsso`.
pub fn register_stock_tasks(xprsso: &mut Xprsso) -> Result<()> {
    xprsso
        .add_task(log_request)?
        .add_task(request_id)?
        .add_task(hello)?
        .add_task(echo_body)?
        .add_task(show_params)?;
    Ok(())
}
