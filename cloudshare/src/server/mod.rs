//! HTTP control surface for published objects

mod catalog;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use catalog::{Catalog, PublishedLink};
pub use routes::render_index;

/// Builds the control surface router on top of `catalog`
pub fn router(catalog: Arc<dyn Catalog>) -> Router {
    routes::handler()
        .layer(Extension(catalog))
        .layer(TraceLayer::new_for_http())
}

/// Serves `router` on `port` until `shutdown_token` is cancelled
///
/// # Errors
///
/// Returns an error if the server fails to bind to the port
pub async fn start_control_server(
    router: Router,
    port: u16,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Control surface listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        })
        .await?;

    Ok(())
}
