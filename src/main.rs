//! xprsso demo server.
//!
//! ```text
//!   xprsso.toml ──► XprssoConfig ──► logging, metrics
//!                        │
//!                        ├─ [options.*] ──► add_options
//!                        └─ query.source ─┐
//!   stock tasks ──► Xprsso ◄──────────────┘
//!                     │ set(app, query)
//!                     ▼
//!                    App ──► HttpServer (trace, timeout, graceful stop)
//! ```
//!
//! Usage: `xprsso [config.toml]`. Without an argument the defaults apply
//! and the query is read from `routes.gql`.

use std::path::Path;

use tokio::net::TcpListener;

use xprsso::config::{load_config, XprssoConfig};
use xprsso::http::tasks::register_stock_tasks;
use xprsso::http::HttpServer;
use xprsso::observability::{logging, metrics};
use xprsso::router::App;
use xprsso::Xprsso;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => XprssoConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("xprsso v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        query_source = %config.query.source,
        request_timeout_secs = config.timeouts.request_secs,
        options = config.options.len(),
        "Configuration loaded"
    );

    let mut xprsso = Xprsso::new();
    register_stock_tasks(&mut xprsso)?;
    for (name, options) in config.options_json()? {
        xprsso.add_options(&name, options)?;
    }

    let mut app = App::new();
    xprsso.set(&mut app, &config.query.source)?;
    for route in app.describe() {
        tracing::info!(route = %route, "Route ready");
    }

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(app, config);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
