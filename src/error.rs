use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Why a request body could not be turned into a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no data provided")]
    NoData,
    #[error("malformed JSON")]
    Malformed,
    #[error("expected a JSON object")]
    NotAnObject,
}

/// Failure reported by (or around) the message channel.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("{0}")]
    Backend(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for PublishError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            PublishError::Unavailable(err.to_string())
        } else {
            PublishError::Backend(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ParseError),
    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<String>),
    #[error("Error publishing event: {0}")]
    Publish(#[from] PublishError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::InvalidRequest(_) | PipelineError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::Publish(_)
            | PipelineError::Configuration(_)
            | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The JSON body sent back to the caller.
    ///
    /// Internal and configuration failures only expose a fixed message; the
    /// detail goes to the log instead.
    pub fn body(&self) -> ErrorBody {
        match self {
            PipelineError::Validation(violations) => ErrorBody::Violations {
                errors: violations.clone(),
            },
            PipelineError::Configuration(_) | PipelineError::Internal(_) => ErrorBody::Message {
                error: "Internal server error".to_string(),
            },
            other => ErrorBody::Message {
                error: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Message { error: String },
    Violations { errors: Vec<String> },
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        if let PipelineError::Internal(detail) | PipelineError::Configuration(detail) = &self {
            tracing::error!(target: "event_gate::error", detail = %detail, "Request failed internally");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PipelineError::RateLimitExceeded.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            PipelineError::from(ParseError::Malformed).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::Validation(vec!["email is required".into()]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::from(PublishError::Timeout(Duration::from_secs(10))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_parse_error_messages() {
        assert_eq!(
            PipelineError::from(ParseError::NoData).to_string(),
            "Invalid request: no data provided"
        );
        assert_eq!(
            PipelineError::from(ParseError::Malformed).to_string(),
            "Invalid request: malformed JSON"
        );
    }

    #[test]
    fn test_publish_error_message_mentions_publishing() {
        let err = PipelineError::from(PublishError::Backend("broker down".into()));
        assert_eq!(err.to_string(), "Error publishing event: broker down");
    }

    #[test]
    fn test_internal_error_body_hides_detail() {
        let err = PipelineError::Internal("rate limit table lock poisoned".into());
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_validation_body_lists_violations() {
        let err = PipelineError::Validation(vec![
            "event_type is required".into(),
            "email format is invalid".into(),
        ]);
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "errors": ["event_type is required", "email format is invalid"] })
        );
    }
}
