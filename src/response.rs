use crate::metrics::MetricsSnapshot;
use crate::rate_limiter::RateLimitSettings;
use serde::{Deserialize, Serialize};

pub const ACCEPTED_MESSAGE: &str = "Event validated and published successfully";

/// Body of a 200 reply to an accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub message: String,
    pub event_id: String,
}

impl AcceptedResponse {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            message: ACCEPTED_MESSAGE.to_string(),
            event_id: event_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub tracked_clients: usize,
    pub rate_limit: RateLimitSettings,
}
