//! HTTP server with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;

use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::{Config, CorsMode},
    error::{Error, Result},
};

/// Headers masked in request logs
pub const SENSITIVE_HEADERS: [http::HeaderName; 3] = [
    http::header::AUTHORIZATION,
    http::header::COOKIE,
    http::header::SET_COOKIE,
];

/// Generates `x-request-id` values from UUIDv7
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&uuid::Uuid::now_v7().to_string())
            .ok()
            .map(RequestId::new)
    }
}

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

    /// Run the server until SIGINT or SIGTERM
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the listener cannot be bound.
    pub async fn serve(self, app: Router) -> Result<()> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the listener cannot be bound.
    pub async fn serve_with_shutdown<F>(self, app: Router, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));
        tracing::info!(service = %self.config.service.name, %addr, "starting server");

        let app = self.apply_layers(app)?;

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "server listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }

    /// Wrap `app` in the middleware stack
    ///
    /// Layers are applied in reverse order (bottom layer is innermost/first).
    ///
    /// # Errors
    ///
    /// Fails when the CORS configuration is invalid.
    pub fn apply_layers(&self, app: Router) -> Result<Router> {
        let service = &self.config.service;
        self.log_middleware_config();

        let app = match self.build_cors_layer()? {
            Some(cors) => app.layer(cors),
            None => app,
        };

        Ok(app
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                service.timeout(),
            ))
            .layer(RequestBodyLimitLayer::new(service.body_limit_bytes()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(SetSensitiveRequestHeadersLayer::new(SENSITIVE_HEADERS))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
            .layer(CatchPanicLayer::new()))
    }

    fn log_middleware_config(&self) {
        let service = &self.config.service;
        tracing::info!(
            cors_mode = %service.cors_mode,
            cors_allowed_origin = ?service.cors_allowed_origin,
            body_limit_mb = service.body_limit_mb,
            timeout_secs = service.timeout_secs,
            "middleware: panic recovery, request id, sensitive header masking, compression, tracing"
        );
    }

    fn build_cors_layer(&self) -> Result<Option<CorsLayer>> {
        let service = &self.config.service;
        let layer = match service.cors()? {
            CorsMode::Disabled => {
                tracing::debug!("CORS disabled");
                return Ok(None);
            }
            CorsMode::Restrictive => {
                tracing::debug!("enabling restrictive CORS (default deny)");
                CorsLayer::new()
            }
            CorsMode::Permissive => CorsLayer::permissive(),
        };

        match &service.cors_allowed_origin {
            Some(origin) => {
                let origin = HeaderValue::from_str(origin).map_err(|e| {
                    Error::InvalidConfig(format!("invalid cors_allowed_origin '{origin}': {e}"))
                })?;
                tracing::debug!(?origin, "restricting CORS origin");
                Ok(Some(layer.allow_origin(AllowOrigin::exact(origin))))
            }
            None => Ok(Some(layer)),
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route("/ping", get(|| async { "pong" }))
    }

    #[test]
    fn test_server_creation() {
        let config = Config::default();
        let server = Server::new(config.clone());
        assert_eq!(server.config().service.port, config.service.port);
    }

    #[test]
    fn test_invalid_cors_mode_is_rejected() {
        let mut config = Config::default();
        config.service.cors_mode = "open".into();
        assert!(matches!(
            Server::new(config).apply_layers(app()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = Server::new(Config::default()).apply_layers(app()).unwrap();
        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_existing_request_id_is_kept() {
        let app = Server::new(Config::default()).apply_layers(app()).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_allowed_origin() {
        let mut config = Config::default();
        config.service.cors_allowed_origin = Some("https://example.com".into());
        let app = Server::new(config).apply_layers(app()).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("origin", "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://example.com"
        );
    }
}
