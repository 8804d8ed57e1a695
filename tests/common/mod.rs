//! Shared helpers for driving a materialized app through axum.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use xprsso::router::App;
use xprsso::{Next, SharedContext, Xprsso};

/// Answers with its own name.
pub async fn foo(_ctx: SharedContext, _req: Request, _next: Next) -> Response {
    "foo".into_response()
}

/// Records that it ran, then passes control on.
pub async fn bar(ctx: SharedContext, req: Request, next: Next) -> Response {
    ctx.update("bar_calls", |n| Value::from(n.and_then(Value::as_u64).unwrap_or(0) + 1));
    next.run(req).await
}

/// Answers with the parsed body, or 415 when none was parsed.
pub async fn echo(_ctx: SharedContext, req: Request, _next: Next) -> Response {
    match req.extensions().get::<xprsso::http::ParsedBody>() {
        Some(body) => axum::Json(body.to_json()).into_response(),
        None => StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response(),
    }
}

/// Answers with the `id` route parameter.
pub async fn user(_ctx: SharedContext, req: Request, _next: Next) -> Response {
    req.extensions()
        .get::<xprsso::RouteParams>()
        .and_then(|p| p.get("id"))
        .unwrap_or("none")
        .to_string()
        .into_response()
}

/// An instance with `foo`, `bar`, `echo` and `user` registered.
pub fn instance() -> Xprsso {
    let mut xprsso = Xprsso::new();
    xprsso
        .add_task(foo)
        .unwrap()
        .add_task(bar)
        .unwrap()
        .add_task(echo)
        .unwrap()
        .add_task(user)
        .unwrap();
    xprsso
}

/// Apply `query` to a fresh app and return the app's router.
pub fn router_for(xprsso: &mut Xprsso, query: &str) -> Router {
    let mut app = App::new();
    xprsso.set(&mut app, query).unwrap();
    app.into_router()
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<(&str, &str)>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some((content_type, text)) => {
            builder = builder.header("content-type", content_type);
            Body::from(text.to_string())
        }
        None => Body::empty(),
    };
    router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response {
    send(router, Method::GET, uri, None).await
}

pub async fn text(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
