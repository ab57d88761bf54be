use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request body: a JSON object keyed by field name.
pub type Payload = Map<String, Value>;

/// Parse a raw request body.
///
/// An empty body, `null` and `{}` all count as "no data"; anything that is
/// valid JSON but not an object is rejected separately.
pub fn parse(raw: &[u8]) -> Result<Payload, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::NoData);
    }

    match serde_json::from_slice::<Value>(raw).map_err(|_| ParseError::Malformed)? {
        Value::Null => Err(ParseError::NoData),
        Value::Object(map) if map.is_empty() => Err(ParseError::NoData),
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

/// Who sent a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub source_ip: String,
    pub user_agent: Option<String>,
}

impl ClientMetadata {
    pub fn new(source_ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            source_ip: source_ip.into(),
            user_agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub source_ip: String,
    pub user_agent: Option<String>,
    pub received_at: String,
}

/// The message handed to the downstream channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub payload: Payload,
    pub metadata: EnvelopeMetadata,
}

impl EventEnvelope {
    pub fn new(payload: Payload, client: ClientMetadata, received_at: String) -> Self {
        Self {
            payload,
            metadata: EnvelopeMetadata {
                source_ip: client.source_ip,
                user_agent: client.user_agent,
                received_at,
            },
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
