use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::app_state::AppState;

use super::handlers;

pub fn build_router(state: Arc<AppState>) -> Router {
    let camera_routes = Router::new()
        .route("/start", post(handlers::start))
        .route("/stop", post(handlers::stop))
        .route("/capture", post(handlers::capture))
        .route("/preview", get(handlers::preview))
        .route("/retake", post(handlers::retake))
        .route("/frame", get(handlers::frame));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/method", post(handlers::select_method))
        .nest("/camera", camera_routes)
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}
