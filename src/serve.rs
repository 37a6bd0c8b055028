//! Development HTTP server: serves the environment's output root as static
//! files on a fixed port, with a permissive cross-origin header on every
//! response. Runs on a current-thread runtime in a background thread so the
//! watcher loop keeps the main thread.

use std::net::SocketAddr;
use std::thread;

use axum::Router;
use axum::http::{HeaderValue, header};
use camino::Utf8PathBuf;
use console::style;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::EnvConfig;
use crate::error::ServeError;

pub const HTTP_PORT: u16 = 3000;

pub fn start(config: &EnvConfig) -> thread::JoinHandle<Result<(), ServeError>> {
    let root = config.output_root.clone();
    let url = style(format!("http://localhost:{HTTP_PORT}/")).yellow();
    eprintln!("Starting a HTTP server on {url}");

    thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(serve(root))
    })
}

async fn serve(root: Utf8PathBuf) -> Result<(), ServeError> {
    let address = SocketAddr::from(([127, 0, 0, 1], HTTP_PORT));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(ServeError::Bind)?;

    let router = Router::new()
        .fallback_service(ServeDir::new(root.as_std_path()))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ));

    axum::serve(listener, router).await.map_err(ServeError::Io)?;

    Ok(())
}
