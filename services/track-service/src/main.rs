//!
//! src/main.rs
//!
//! Entry point of the track service: loads configuration, authenticates
//! against the catalog, opens the store, and serves the HTTP api until
//! ctrl-c
//!
//!

mod config;
mod errors;
mod logging;

mod docs;
mod fetch;
mod persistent;
mod routes;
mod service;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::ServiceError;

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let cfgs    = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "track-service",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let store = persistent::TrackStore::init(
        &cfgs.persistence.db_url,
        cfgs.persistence.max_connections
    ).await?;
    info!(db = %cfgs.persistence.db_url, tracks = store.count().await?, "store.ready");

    // no token, no service
    let spotify = fetch::SpotifyClient::connect(&cfgs.http, &cfgs.spotify).await?;

    let tracks = service::TrackService::new(store, Arc::new(spotify));
    let app = routes::router(routes::AppState { tracks });

    let listener = tokio::net::TcpListener::bind(cfgs.server.bind_addr).await?;
    info!(addr = %cfgs.server.bind_addr, "server.start");

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(msg = "shutting track service down", "server.signal");
            trigger.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("server.exit");
    Ok(())
}
