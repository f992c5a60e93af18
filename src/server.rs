//! Local dev server for the generated site.
//!
//! A single `tower-http` [`ServeDir`] rooted at the site directory, mounted
//! as the router's fallback. Directory requests serve their `index.html`;
//! everything else is a plain static file or a 404. The directory is read
//! on every request, so files rewritten by the watcher show up on reload.

use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static-file router for `site_dir`.
pub fn router(site_dir: &Path) -> Router {
    Router::new().fallback_service(ServeDir::new(site_dir).append_index_html_on_directories(true))
}

/// Bind the listener. Split from [`serve`] so the caller can report the
/// bound address (and fail fast) before serving.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServeError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })
}

/// Serve `site_dir` on `listener` until the process exits.
pub async fn serve(listener: TcpListener, site_dir: &Path) -> Result<(), ServeError> {
    axum::serve(listener, router(site_dir)).await?;
    Ok(())
}

/// Address a listener is bound to, for the banner.
pub fn local_addr(listener: &TcpListener) -> Result<SocketAddr, ServeError> {
    Ok(listener.local_addr()?)
}
