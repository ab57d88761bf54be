use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header::USER_AGENT, HeaderMap},
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult, PublishError};
use crate::metrics::{Outcome, PipelineMetrics};
use crate::middleware::client_ip;
use crate::payload::{self, ClientMetadata, EventEnvelope};
use crate::publisher::Publisher;
use crate::rate_limiter::RateLimiter;
use crate::response::{AcceptedResponse, HealthResponse, MetricsResponse};
use crate::schema::Schema;
use crate::timestamp;
use crate::transform::transform;
use crate::validation::{validate, ValidationOutcome};

pub const DEFAULT_DESTINATION: &str = "events-topic";
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub handler: RequestHandler,
}

impl AppState {
    pub fn new(handler: RequestHandler) -> SharedState {
        Arc::new(Self { handler })
    }
}

/// What the channel handed back for an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub event_id: String,
}

/// Runs one request through rate check, parse, transform, validate and
/// publish, stopping at the first stage that fails.
pub struct RequestHandler {
    limiter: RateLimiter,
    schema: Schema,
    publisher: Arc<dyn Publisher>,
    destination: String,
    publish_timeout: Duration,
    metrics: PipelineMetrics,
}

impl RequestHandler {
    pub fn new(limiter: RateLimiter, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            limiter,
            schema: Schema::events(),
            publisher,
            destination: DEFAULT_DESTINATION.to_string(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub async fn handle(&self, raw_body: &[u8], client: ClientMetadata) -> PipelineResult<PublishReceipt> {
        let result = self.process(raw_body, client).await;

        self.metrics.record(match &result {
            Ok(_) => Outcome::Accepted,
            Err(PipelineError::RateLimitExceeded) => Outcome::RateLimited,
            Err(PipelineError::InvalidRequest(_) | PipelineError::Validation(_)) => Outcome::Rejected,
            Err(PipelineError::Publish(_)) => Outcome::PublishFailed,
            Err(PipelineError::Configuration(_) | PipelineError::Internal(_)) => Outcome::InternalError,
        });

        result
    }

    async fn process(&self, raw_body: &[u8], client: ClientMetadata) -> PipelineResult<PublishReceipt> {
        if !self.limiter.admit(&client.source_ip)? {
            tracing::warn!(
                target: "event_gate::handlers",
                client = %client.source_ip,
                "Rate limit exceeded"
            );
            return Err(PipelineError::RateLimitExceeded);
        }

        let payload = payload::parse(raw_body).map_err(|e| {
            tracing::debug!(target: "event_gate::handlers", client = %client.source_ip, error = %e, "Unparsable request body");
            e
        })?;

        let normalized = transform(&payload);

        let accepted = match validate(&normalized, &self.schema) {
            ValidationOutcome::Accepted(accepted) => accepted,
            ValidationOutcome::Rejected(violations) => {
                tracing::debug!(
                    target: "event_gate::handlers",
                    client = %client.source_ip,
                    violations = ?violations,
                    "Payload rejected"
                );
                return Err(PipelineError::Validation(violations));
            }
        };

        let envelope = EventEnvelope::new(accepted, client, timestamp::now_iso8601());
        let body = envelope
            .to_bytes()
            .map_err(|e| PipelineError::Internal(format!("failed to encode event envelope: {}", e)))?;

        let event_id = self.publish(body).await.map_err(|e| {
            tracing::error!(
                target: "event_gate::handlers",
                client = %envelope.metadata.source_ip,
                destination = %self.destination,
                error = %e,
                "Failed to publish event"
            );
            PipelineError::Publish(e)
        })?;

        tracing::info!(
            target: "event_gate::handlers",
            client = %envelope.metadata.source_ip,
            event_id = %event_id,
            "Event published"
        );

        Ok(PublishReceipt { event_id })
    }

    /// A single publish attempt bounded by `publish_timeout`.
    async fn publish(&self, body: Vec<u8>) -> Result<String, PublishError> {
        match tokio::time::timeout(self.publish_timeout, self.publisher.publish(&self.destination, body)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.publish_timeout)),
        }
    }
}

fn client_metadata(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientMetadata {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ClientMetadata::new(client_ip(headers, peer), user_agent)
}

/// Validate an event and publish it
pub async fn validate_event(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AcceptedResponse>, PipelineError> {
    let client = client_metadata(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let receipt = state.handler.handle(&body, client).await?;

    Ok(Json(AcceptedResponse::new(receipt.event_id)))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}

/// Pipeline counters and rate limiter occupancy
pub async fn metrics(State(state): State<SharedState>) -> Result<Json<MetricsResponse>, PipelineError> {
    let limiter = state.handler.limiter();

    Ok(Json(MetricsResponse {
        counters: state.handler.metrics().snapshot(),
        tracked_clients: limiter.tracked_keys()?,
        rate_limit: limiter.settings().clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryPublisher;
    use crate::rate_limiter::RateLimitSettings;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StalledPublisher;

    #[async_trait]
    impl Publisher for StalledPublisher {
        async fn publish(&self, _destination: &str, _payload: Vec<u8>) -> Result<String, PublishError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    fn handler_with(publisher: Arc<dyn Publisher>, max_requests: u32) -> RequestHandler {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_requests,
            ..RateLimitSettings::default()
        })
        .unwrap();
        RequestHandler::new(limiter, publisher)
    }

    fn client() -> ClientMetadata {
        ClientMetadata::new("127.0.0.1", Some("test-agent".to_string()))
    }

    fn valid_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event_type": "test_event",
            "data": {"key": "value"},
            "email": " Test@Example.com ",
            "phone": "+1 (234) 567-890",
            "timestamp": "2024-02-14 12:00:00"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_accepted_event_is_published_normalized() {
        let publisher = InMemoryPublisher::new();
        let handler = handler_with(Arc::new(publisher.clone()), 100);

        let receipt = handler.handle(&valid_body(), client()).await.unwrap();

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, receipt.event_id);
        assert_eq!(messages[0].destination, DEFAULT_DESTINATION);

        let envelope: Value = serde_json::from_slice(&messages[0].payload).unwrap();
        assert_eq!(envelope["payload"]["email"], "test@example.com");
        assert_eq!(envelope["payload"]["phone"], "1234567890");
        assert_eq!(envelope["payload"]["timestamp"], "2024-02-14T12:00:00");
        assert_eq!(envelope["metadata"]["source_ip"], "127.0.0.1");
        assert_eq!(envelope["metadata"]["user_agent"], "test-agent");
        assert!(envelope["metadata"]["received_at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_rate_limit_checked_before_parsing() {
        let handler = handler_with(Arc::new(InMemoryPublisher::new()), 1);

        assert!(matches!(
            handler.handle(b"not json", client()).await,
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(matches!(
            handler.handle(&valid_body(), client()).await,
            Err(PipelineError::RateLimitExceeded)
        ));
    }

    #[tokio::test]
    async fn test_rejected_event_is_not_published() {
        let publisher = InMemoryPublisher::new();
        let handler = handler_with(Arc::new(publisher.clone()), 100);

        let result = handler.handle(br#"{"data": {"key": "value"}}"#, client()).await;

        match result {
            Err(PipelineError::Validation(violations)) => {
                assert!(violations.iter().any(|v| v == "event_type is required"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(publisher.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_publish_times_out() {
        let handler = handler_with(Arc::new(StalledPublisher), 100)
            .with_publish_timeout(Duration::from_secs(10));

        let result = handler.handle(&valid_body(), client()).await;

        match result {
            Err(PipelineError::Publish(PublishError::Timeout(timeout))) => {
                assert_eq!(timeout, Duration::from_secs(10));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(handler.metrics().snapshot().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_custom_destination() {
        let publisher = InMemoryPublisher::new();
        let handler = handler_with(Arc::new(publisher.clone()), 100).with_destination("audit-events");

        handler.handle(&valid_body(), client()).await.unwrap();
        assert_eq!(publisher.messages()[0].destination, "audit-events");
    }

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let handler = handler_with(Arc::new(InMemoryPublisher::new()), 2);

        handler.handle(&valid_body(), client()).await.unwrap();
        let _ = handler.handle(b"", client()).await;
        let _ = handler.handle(&valid_body(), client()).await;

        let snapshot = handler.metrics().snapshot();
        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.accepted, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.rate_limited, 1);
    }

    #[test]
    fn test_client_metadata_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert(USER_AGENT, "curl/8.0".parse().unwrap());

        let metadata = client_metadata(&headers, None);
        assert_eq!(metadata.source_ip, "203.0.113.7");
        assert_eq!(metadata.user_agent.as_deref(), Some("curl/8.0"));
    }
}
