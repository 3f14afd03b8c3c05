use anyhow::{Context, Result};
use tracing::info;

use crate::web::{create_router, AppState};

/// Serve the control API until the shutdown token fires.
pub async fn start_web_server(state: AppState, bind: &str, port: u16) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding HTTP server to {}", addr))?;
    info!("🌐 HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("🔧 HTTP server stopped");
    Ok(())
}
