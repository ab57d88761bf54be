use crate::payload::Payload;
use crate::schema::{FieldRule, FieldType, Schema};
use serde_json::Value;

/// Result of checking a payload against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(Payload),
    Rejected(Vec<String>),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }
}

fn matches_type(value: &Value, field_type: FieldType) -> bool {
    match field_type {
        FieldType::String => value.is_string(),
        // Floats such as 1.0 are not integers; booleans are never numbers in JSON.
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Object => value.is_object(),
        FieldType::Any => true,
    }
}

/// Check one field against its rule, reporting only the first failure.
///
/// `null` is treated the same as an absent value. Pattern checks are left to
/// [`validate`].
pub fn validate_field(name: &str, value: Option<&Value>, rule: &FieldRule) -> Option<String> {
    let value = match value {
        None | Some(Value::Null) if rule.required => return Some(format!("{} is required", name)),
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };

    if !matches_type(value, rule.field_type) {
        return Some(format!("{} must be {}", name, rule.field_type.with_article()));
    }

    if let Value::String(text) = value {
        let length = text.chars().count();
        if let Some(min_length) = rule.min_length {
            if length < min_length {
                return Some(format!("{} must be at least {} characters long", name, min_length));
            }
        }
        if let Some(max_length) = rule.max_length {
            if length > max_length {
                return Some(format!("{} must be at most {} characters long", name, max_length));
            }
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = rule.min {
            if number < min {
                return Some(format!("{} must be greater than or equal to {}", name, min));
            }
        }
        if let Some(max) = rule.max {
            if number > max {
                return Some(format!("{} must be less than or equal to {}", name, max));
            }
        }
    }

    None
}

/// Check every field of `schema`, collecting one violation per failing field
/// in schema order.
pub fn validate(payload: &Payload, schema: &Schema) -> ValidationOutcome {
    let mut violations = Vec::new();

    for (name, rule) in schema.iter() {
        let value = payload.get(name);

        if let Some(violation) = validate_field(name, value, rule) {
            violations.push(violation);
            continue;
        }

        if let (Some(Value::String(text)), Some(pattern)) = (value, &rule.pattern) {
            if !pattern.is_match(text) {
                violations.push(format!("{} format is invalid", name));
            }
        }
    }

    if violations.is_empty() {
        ValidationOutcome::Accepted(payload.clone())
    } else {
        ValidationOutcome::Rejected(violations)
    }
}
