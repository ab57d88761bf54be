use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::handlers::{health_check, metrics, validate_event, AppState, RequestHandler, SharedState};
use crate::middleware::logging_middleware;
use crate::publisher::{LogPublisher, Publisher, RedisPublisher};
use crate::rate_limiter::RateLimiter;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the router around an already wired request handler.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        // Validation endpoints
        .route("/", post(validate_event))
        .route("/validate", post(validate_event))
        // Health and metrics endpoints, never rate limited
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
}

impl Server {
    pub async fn new(config: &Config) -> PipelineResult<Self> {
        config.validate()?;

        let limiter = RateLimiter::new(config.rate_limit_settings()?)?;
        let schema = config.load_schema()?;
        let publisher = connect_publisher(config).await?;

        tracing::info!(
            fields = schema.len(),
            topic = %config.events_topic,
            rate_limit = config.rate_limit,
            rate_window = ?config.rate_window,
            "Request pipeline configured"
        );

        let handler = RequestHandler::new(limiter, publisher)
            .with_schema(schema)
            .with_destination(config.events_topic.clone())
            .with_publish_timeout(config.publish_timeout);

        Ok(Self {
            app: create_app(AppState::new(handler)),
            bind_addr: config.bind_addr,
        })
    }

    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("Event gate listening on {}", self.bind_addr);
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn connect_publisher(config: &Config) -> PipelineResult<Arc<dyn Publisher>> {
    match &config.redis_url {
        Some(url) => {
            let publisher = RedisPublisher::connect(url)
                .await
                .map_err(|e| PipelineError::Configuration(format!("cannot reach Redis: {}", e)))?;
            publisher
                .ping()
                .await
                .map_err(|e| PipelineError::Configuration(format!("Redis ping failed: {}", e)))?;
            tracing::info!("Publishing events to Redis stream '{}'", config.events_topic);
            Ok(Arc::new(publisher))
        }
        None => {
            tracing::warn!("REDIS_URL not set, accepted events are logged and discarded");
            Ok(Arc::new(LogPublisher))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
