//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Turn a materialized [`App`] into an axum router
//! - Wire up middleware (tracing, request timeout)
//! - Bind server to listener
//! - Stop gracefully on a stop signal or an explicit [`Shutdown`] trigger

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::XprssoConfig;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::Shutdown;
use crate::router::App;

/// HTTP server for a materialized application.
pub struct HttpServer {
    router: Router,
    config: XprssoConfig,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a server serving `app` with the given configuration.
    pub fn new(app: App, config: XprssoConfig) -> Self {
        let router = Self::build_router(app, &config);
        Self {
            router,
            config,
            shutdown: Shutdown::new(),
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(app: App, config: &XprssoConfig) -> Router {
        tracing::debug!(routes = app.route_count(), parsers = app.body_parser_count(), "Building router");
        app.into_router()
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Handle that stops [`run`](Self::run) when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// The fully layered router, for driving requests without a listener.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let signals = spawn_signal_listener(self.shutdown.clone());
        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.shutdown.wait())
            .await?;
        signals.abort();

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &XprssoConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_empty_app_answers_not_found() {
        let server = HttpServer::new(App::new(), XprssoConfig::default());
        assert_eq!(server.config().timeouts.request_secs, 30);
        let res = server
            .into_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_stops_on_trigger() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = HttpServer::new(App::new(), XprssoConfig::default());
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(server.run(listener));
        tokio::task::yield_now().await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }
}
