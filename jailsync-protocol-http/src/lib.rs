mod error;
mod logging;
mod sync;
#[cfg(test)]
mod tests;

use std::fmt::Debug;

use anyhow::{Context, Result};
use jailsync_common::ListenEndpoint;
use jailsync_core::Services;
use poem::listener::TcpListener;
use poem::{get, handler, post, Endpoint, EndpointExt, Route, Server};
use tracing::*;

pub use crate::error::ApiError;
pub use crate::sync::MAX_BODY_SIZE;

#[derive(Clone)]
pub struct SyncHttpServer {
    services: Services,
}

impl SyncHttpServer {
    pub fn new(services: &Services) -> Self {
        SyncHttpServer {
            services: services.clone(),
        }
    }

    pub async fn run(self, address: ListenEndpoint) -> Result<()> {
        let app = make_app(&self.services);
        info!(%address, "Listening");
        Server::new(TcpListener::bind(*address))
            .run(app)
            .await
            .context("Failed to start the sync endpoint")
    }
}

#[handler]
fn health() -> poem::web::Json<serde_json::Value> {
    poem::web::Json(serde_json::json!({ "status": "ok" }))
}

pub fn make_app(services: &Services) -> impl Endpoint {
    Route::new()
        .at("/sync", post(sync::sync_endpoint))
        .at("/health", get(health))
        .around(logging::log_requests)
        .data(services.clone())
}

impl Debug for SyncHttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyncHttpServer")
    }
}
