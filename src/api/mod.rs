pub mod health;
pub mod pnl;
pub mod preferences;
pub mod transactions;

use crate::db::Repository;
use crate::orchestration::Refresher;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub refresher: Arc<Refresher>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, refresher: Arc<Refresher>) -> Self {
        Self { repo, refresher }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/pnl", get(pnl::get_pnl))
        .route("/v1/transactions", get(transactions::get_transactions))
        .route(
            "/v1/preferences",
            get(preferences::get_preferences).put(preferences::put_preferences),
        )
        .layer(cors)
        .with_state(state)
}
