//! 有権者照会 HTTP API
//!
//! - `GET /health`
//! - `POST /api/voter-info`
//! - `POST /api/batch-voter-info`

pub mod error;
pub mod health;
pub mod voter;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::service::VoterLookup;
use crate::signal::shutdown_signal;

pub use error::ApiError;
pub use health::health_routes;
pub use voter::{batch_voter_info, parse_voter_request, voter_info};

#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<dyn VoterLookup>,
}

impl AppState {
    pub fn new(lookup: impl VoterLookup + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }
}

/// 未定義のルート
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".into())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/voter-info", post(voter_info))
        .route("/api/batch-voter-info", post(batch_voter_info))
        .merge(health_routes())
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API サーバーを起動（終了シグナルまで戻らない）
pub async fn serve(state: AppState, config: &ApiConfig) -> std::io::Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Voter info API listening on {}", address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutting down API server");
        })
        .await
}
