//! HTTP exposition of the generation timing histogram.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;

use crate::schema::MetricsConfig;

use super::{HistogramSink, MetricsError};

/// Content type of the Prometheus text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Router serving `sink` at `path`.
pub fn router(path: &str, sink: Arc<HistogramSink>) -> Router {
    Router::new().route(path, get(scrape)).with_state(sink)
}

async fn scrape(State(sink): State<Arc<HistogramSink>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], sink.render())
}

/// Serve the exposition on an already bound listener until the process
/// exits.
pub async fn serve_on(
    listener: TcpListener,
    path: &str,
    sink: Arc<HistogramSink>,
) -> Result<(), MetricsError> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Serving generation metrics on http://{}{}", addr, path);
    }
    axum::serve(listener, router(path, sink)).await?;
    Ok(())
}

/// Bind the configured address and serve the exposition.
pub async fn serve(config: &MetricsConfig, sink: Arc<HistogramSink>) -> Result<(), MetricsError> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| MetricsError::Bind { addr, source })?;
    serve_on(listener, &config.path, sink).await
}

/// Run the exporter on its own thread with a single-threaded runtime.
///
/// Exporter failures are logged on that thread; the returned handle only
/// finishes once the server stops.
pub fn spawn(config: MetricsConfig, sink: Arc<HistogramSink>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("metrics-exporter".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to start metrics runtime: {}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(serve(&config, sink)) {
                log::error!("{}", e);
            }
        })
}
