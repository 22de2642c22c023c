mod delete;
mod health;
mod index;

use axum::{
    routing::{get, post},
    Router,
};

pub use index::render_index;

/// Creates the router with all handler routes
pub fn handler() -> Router {
    Router::new()
        .route("/", get(index::handler))
        .route("/delete", post(delete::handler))
        .route("/health", get(health::handler))
}
