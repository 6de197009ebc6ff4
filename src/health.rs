// Liveness endpoint
//
// 200 OK with an empty body on `/` and `/health`. It says the process is up,
// nothing about chain or delivery health.

use axum::{http::StatusCode, routing::get, Router};
use eyre::{Result, WrapErr};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

async fn alive() -> StatusCode {
    StatusCode::OK
}

/// Bind `addr`; returns the listener so the caller knows the bound port.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind health endpoint on {addr}"))?;
    info!(addr = %listener.local_addr()?, "health endpoint listening");
    Ok(listener)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
        .wrap_err("health endpoint failed")?;
    info!("health endpoint closed");
    Ok(())
}
