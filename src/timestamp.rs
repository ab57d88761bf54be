//! Timestamp forms accepted on input and the canonical form emitted downstream.

use chrono::{DateTime, NaiveDateTime, Utc};

/// `YYYY-MM-DDTHH:MM:SS`, UTC, no zone designator.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const ISO_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const PLAIN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ISO-8601 with a zone designator (`Z` or an offset), or the zone-less ISO
/// form. Zoned values are converted to UTC.
fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Some(zoned.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(value, ISO_LOCAL_FORMAT).ok()
}

fn parse_plain(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, PLAIN_FORMAT).ok()
}

pub fn parse(value: &str) -> Option<NaiveDateTime> {
    parse_iso(value).or_else(|| parse_plain(value))
}

pub fn is_valid(value: &str) -> bool {
    parse(value).is_some()
}

/// Re-emit `value` in canonical form, or `None` if no accepted form parses.
/// Sub-second precision is dropped.
pub fn canonicalize(value: &str) -> Option<String> {
    parse(value).map(|parsed| parsed.format(CANONICAL_FORMAT).to_string())
}

/// Current UTC time for envelope metadata.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_accepted_forms() {
        assert_eq!(
            canonicalize("2024-02-14T12:00:00Z").as_deref(),
            Some("2024-02-14T12:00:00")
        );
        assert_eq!(
            canonicalize("2024-02-14 12:00:00").as_deref(),
            Some("2024-02-14T12:00:00")
        );
        assert_eq!(
            canonicalize("2024-02-14T12:00:00").as_deref(),
            Some("2024-02-14T12:00:00")
        );
        assert_eq!(
            canonicalize("2024-02-14T12:00:00.250Z").as_deref(),
            Some("2024-02-14T12:00:00")
        );
    }

    #[test]
    fn test_offsets_are_converted_to_utc() {
        assert_eq!(
            canonicalize("2024-02-14T14:30:00+02:00").as_deref(),
            Some("2024-02-14T12:30:00")
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(!is_valid("invalid-timestamp"));
        assert!(!is_valid("2024-02-14"));
        assert!(!is_valid("2024-13-01 00:00:00"));
        assert!(canonicalize("").is_none());
    }

    #[test]
    fn test_now_is_parseable() {
        assert!(is_valid(&now_iso8601()));
    }
}
