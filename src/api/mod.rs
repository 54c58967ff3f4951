//! REST API over the simulation engine.
//!
//! Routes:
//! - `GET /api/v5.json`: PVWatts v5 simulation
//! - `GET /api/v4.json`: PVWatts v4 simulation
//! - `GET /ssc/modules`: engine module registry
//! - `GET /ssc/modules/{name}`: one module and its variables
//! - `POST /ssc/modules/{name}`: run a module with JSON inputs

mod handlers;
mod types;

pub use types::{ApiError, ErrorResponse, ModuleListing};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::pvwatts::PvWattsService;
use crate::ssc::{SimulationRunner, SscApi};

/// Application state shared across all request handlers.
///
/// Everything in it is read-only or internally shared, so handlers only
/// ever clone handles out of it.
pub struct AppState {
    /// Engine binding every route calls into.
    pub api: Arc<dyn SscApi>,
    pub pvwatts: PvWattsService,
    /// Runner for the generic module routes.
    pub runner: SimulationRunner,
}

impl AppState {
    pub fn new(api: Arc<dyn SscApi>, pvwatts: PvWattsService) -> Self {
        Self {
            runner: SimulationRunner::new(Arc::clone(&api)),
            api,
            pvwatts,
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v5.json", get(handlers::get_v5))
        .route("/api/v4.json", get(handlers::get_v4))
        .route("/ssc/modules", get(handlers::list_modules))
        .route(
            "/ssc/modules/{name}",
            get(handlers::get_module).post(handlers::simulate_module),
        )
        .with_state(state)
}

/// Binds to `addr` and serves the API until the server stops.
///
/// # Errors
///
/// Returns the I/O error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
