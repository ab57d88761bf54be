//! Best-effort normalization of well-known fields.
//!
//! Only string values are touched; anything else is left for the validator to
//! reject with a type error.

use crate::payload::Payload;
use crate::timestamp;
use serde_json::Value;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keep only ASCII digits, so `+1 (234) 567-890` becomes `1234567890`.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Canonical timestamp when one of the accepted forms parses, otherwise the
/// original string.
pub fn normalize_timestamp(value: &str) -> String {
    timestamp::canonicalize(value).unwrap_or_else(|| value.to_string())
}

pub fn transform(payload: &Payload) -> Payload {
    let mut transformed = payload.clone();

    rewrite(&mut transformed, "email", normalize_email);
    rewrite(&mut transformed, "phone", normalize_phone);
    rewrite(&mut transformed, "timestamp", normalize_timestamp);

    transformed
}

fn rewrite(payload: &mut Payload, field: &str, normalize: fn(&str) -> String) {
    if let Some(Value::String(value)) = payload.get_mut(field) {
        *value = normalize(value);
    }
}
