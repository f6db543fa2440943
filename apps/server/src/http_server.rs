//! HTTP status API.
//!
//! Handlers only read the snapshot in [`AppState`](crate::state::AppState);
//! they never reach the connection manager.

use crate::state::SharedState;
use chainwatch_core::TradingPair;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Create the status API router.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/opportunity", get(opportunity_handler))
        .route("/stats", get(stats_handler))
        .route("/prices/:base/:quote", get(prices_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn status_handler(State(state): State<SharedState>) -> Response {
    Json(state.status_report().await).into_response()
}

/// Latest price difference, or 404 before the first one.
async fn opportunity_handler(State(state): State<SharedState>) -> Response {
    match state.last_difference().await {
        Some(difference) => Json(difference).into_response(),
        None => (StatusCode::NOT_FOUND, "no price difference detected yet").into_response(),
    }
}

/// Latest quote from each venue for one pair, or 404 if none yet.
async fn prices_handler(
    State(state): State<SharedState>,
    Path((base, quote)): Path<(String, String)>,
) -> Response {
    let pair = TradingPair::new(&base, &quote);
    let quotes = state.quotes_for_pair(&pair);
    if quotes.is_empty() {
        return (StatusCode::NOT_FOUND, format!("no prices for {}", pair)).into_response();
    }
    Json(quotes).into_response()
}

async fn stats_handler(State(state): State<SharedState>) -> Response {
    Json(state.stats_summary()).into_response()
}

/// Bind the status API on all interfaces and serve it in the background.
pub async fn start_http_server(
    state: SharedState,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Status API listening on http://{}", addr);

    serve(listener, state);
    Ok(())
}

fn serve(listener: TcpListener, state: SharedState) {
    let app = create_router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Status API error: {}", e);
        }
    });
}
