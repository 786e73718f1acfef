use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;

/// Registration and sessions are the only unauthenticated routes.
pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/users", post(handlers::register))
        .route("/sessions", post(handlers::create_session))
        .with_state(state)
}
