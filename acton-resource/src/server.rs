//! HTTP server with graceful shutdown

use axum::{http::StatusCode, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::Config,
    error::Result,
    middleware::{request_id_layer, request_id_propagation_layer, sensitive_headers_layer},
    state::AppState,
};

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the server until SIGINT or SIGTERM, then close every dependency
    ///
    /// The health route is added to `app`.
    pub async fn serve(self, app: Router, state: &AppState) -> Result<()> {
        let addr = format!("{}:{}", self.config.service.host, self.config.service.port);
        tracing::info!(service = %self.config.service.name, %addr, "Starting server");

        let app = self.apply_layers(app.merge(state.health_router()));
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        state.dependencies().shutdown().await;
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Wrap `app` in the standard middleware stack
    pub fn apply_layers(&self, app: Router) -> Router {
        let middleware = &self.config.middleware;
        tracing::debug!(
            body_limit_mb = middleware.body_limit_mb,
            cors_mode = %middleware.cors_mode,
            timeout_secs = self.config.service.timeout_secs,
            "Middleware configuration"
        );

        app.layer(self.build_cors_layer())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.service.timeout(),
            ))
            .layer(RequestBodyLimitLayer::new(middleware.body_limit_mb * 1024 * 1024))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(sensitive_headers_layer())
            .layer(request_id_propagation_layer())
            .layer(request_id_layer())
            .layer(CatchPanicLayer::new())
    }

    /// Build CORS layer based on configuration
    fn build_cors_layer(&self) -> CorsLayer {
        match self.config.middleware.cors_mode.as_str() {
            "permissive" => CorsLayer::permissive(),
            "restrictive" | "disabled" => CorsLayer::new(),
            other => {
                tracing::warn!(cors_mode = other, "Unknown CORS mode, defaulting to permissive");
                CorsLayer::permissive()
            }
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
