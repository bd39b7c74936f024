//! Web UI and JSON API.

pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::feedback::FeedbackSink;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Classifier,
    pub feedback: Arc<dyn FeedbackSink>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        classifier: Classifier,
        feedback: impl FeedbackSink + 'static,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            classifier,
            feedback: Arc::new(feedback),
            max_upload_bytes,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/api/classify", post(routes::classify))
        .route(
            "/api/classify/file",
            post(routes::classify_file).layer(upload_limit),
        )
        .route("/api/flag", post(routes::flag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
