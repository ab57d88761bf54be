//! Declarative field rules and the ordered schema they live in.

use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

/// Accepted JSON shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Object,
    Any,
}

impl FieldType {
    /// The type name with its indefinite article, as used in violation messages.
    pub fn with_article(self) -> &'static str {
        match self {
            FieldType::String => "a string",
            FieldType::Integer => "an integer",
            FieldType::Object => "an object",
            FieldType::Any => "any value",
        }
    }
}

/// Well-known string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Email,
    Phone,
    DateTime,
}

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const PHONE_PATTERN: &str = r"^\+?[\d\s\-\(\)]+$";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PHONE_PATTERN).expect("phone pattern is valid"))
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Format(Format),
    /// A user supplied expression, compiled anchored at both ends.
    Regex(Regex),
}

impl Pattern {
    /// Compile `source` so it must match the whole value.
    pub fn regex(source: &str) -> PipelineResult<Self> {
        Regex::new(&format!("^(?:{})$", source))
            .map(Pattern::Regex)
            .map_err(|e| PipelineError::Configuration(format!("invalid pattern '{}': {}", source, e)))
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Pattern::Format(Format::Email) => email_regex().is_match(value),
            Pattern::Format(Format::Phone) => phone_regex().is_match(value),
            Pattern::Format(Format::DateTime) => crate::timestamp::is_valid(value),
            Pattern::Regex(re) => re.is_match(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub required: bool,
    pub field_type: FieldType,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Pattern>,
}

impl FieldRule {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            required: false,
            field_type,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            pattern: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.pattern = Some(Pattern::Format(format));
        self
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn check_bounds(&self, name: &str) -> PipelineResult<()> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(PipelineError::Configuration(format!(
                    "field '{}': minLength {} exceeds maxLength {}",
                    name, min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(PipelineError::Configuration(format!(
                    "field '{}': min {} exceeds max {}",
                    name, min, max
                )));
            }
        }
        Ok(())
    }
}

/// Field rules in reporting order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldRule)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule, replacing an earlier rule of the same name in place.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        let name = name.into();
        match self.fields.iter().position(|(existing, _)| *existing == name) {
            Some(index) => self.fields[index].1 = rule,
            None => self.fields.push((name, rule)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The schema for incoming events.
    pub fn events() -> Self {
        Schema::new()
            .field("event_type", FieldRule::new(FieldType::String).required())
            .field("data", FieldRule::new(FieldType::Object).required())
            .field("email", FieldRule::new(FieldType::String).required().format(Format::Email))
            .field("phone", FieldRule::new(FieldType::String).required().format(Format::Phone))
            .field(
                "timestamp",
                FieldRule::new(FieldType::String).required().format(Format::DateTime),
            )
    }

    /// Parse a schema from its JSON file form: an array of field definitions.
    pub fn from_json(source: &str) -> PipelineResult<Self> {
        let definitions: Vec<FieldDefinition> = serde_json::from_str(source)
            .map_err(|e| PipelineError::Configuration(format!("invalid schema file: {}", e)))?;

        let mut schema = Schema::new();
        for definition in definitions {
            if schema.get(&definition.name).is_some() {
                return Err(PipelineError::Configuration(format!(
                    "field '{}' is defined more than once",
                    definition.name
                )));
            }
            let (name, rule) = definition.into_rule()?;
            schema = schema.field(name, rule);
        }
        Ok(schema)
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read schema file {}: {}", path.display(), e))
        })?;
        Self::from_json(&source)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FieldDefinition {
    name: String,
    #[serde(default)]
    required: bool,
    #[serde(rename = "type", default = "any_type")]
    field_type: FieldType,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min: Option<f64>,
    max: Option<f64>,
    format: Option<Format>,
    pattern: Option<String>,
}

fn any_type() -> FieldType {
    FieldType::Any
}

impl FieldDefinition {
    fn into_rule(self) -> PipelineResult<(String, FieldRule)> {
        let pattern = match (self.format, self.pattern) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::Configuration(format!(
                    "field '{}': set either format or pattern, not both",
                    self.name
                )))
            }
            (Some(format), None) => Some(Pattern::Format(format)),
            (None, Some(source)) => Some(Pattern::regex(&source)?),
            (None, None) => None,
        };

        let rule = FieldRule {
            required: self.required,
            field_type: self.field_type,
            min_length: self.min_length,
            max_length: self.max_length,
            min: self.min,
            max: self.max,
            pattern,
        };
        rule.check_bounds(&self.name)?;
        Ok((self.name, rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_schema_order() {
        let events = Schema::events();
        let names: Vec<&str> = events.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["event_type", "data", "email", "phone", "timestamp"]);
    }

    #[test]
    fn test_named_formats() {
        let email = Pattern::Format(Format::Email);
        assert!(email.is_match("test@example.com"));
        assert!(!email.is_match("invalid-email"));
        assert!(!email.is_match("test@example"));

        let phone = Pattern::Format(Format::Phone);
        assert!(phone.is_match("+1 (234) 567-890"));
        assert!(phone.is_match("1234567890"));
        assert!(!phone.is_match(""));
        assert!(!phone.is_match("call me"));
    }

    #[test]
    fn test_literal_pattern_is_anchored() {
        let pattern = Pattern::regex("[a-z]+").unwrap();
        assert!(pattern.is_match("abc"));
        assert!(!pattern.is_match("abc1"));
        assert!(!pattern.is_match("1abc"));
    }

    #[test]
    fn test_schema_from_json_keeps_order() {
        let schema = Schema::from_json(
            r#"[
                {"name": "user", "required": true, "type": "string", "minLength": 2, "maxLength": 10},
                {"name": "age", "type": "integer", "min": 0, "max": 120},
                {"name": "code", "type": "string", "pattern": "[A-Z]{3}"},
                {"name": "contact", "type": "string", "format": "email"}
            ]"#,
        )
        .unwrap();

        let names: Vec<&str> = schema.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["user", "age", "code", "contact"]);

        let user = schema.get("user").unwrap();
        assert!(user.required);
        assert_eq!(user.field_type, FieldType::String);
        assert_eq!(user.min_length, Some(2));
        assert_eq!(schema.get("age").unwrap().max, Some(120.0));
        assert!(matches!(
            schema.get("contact").unwrap().pattern,
            Some(Pattern::Format(Format::Email))
        ));
    }

    #[test]
    fn test_schema_from_json_rejects_bad_definitions() {
        assert!(Schema::from_json(r#"[{"name": "x", "pattern": "("}]"#).is_err());
        assert!(Schema::from_json(r#"[{"name": "x", "minLength": 5, "maxLength": 1}]"#).is_err());
        assert!(Schema::from_json(r#"[{"name": "x", "type": "float"}]"#).is_err());
        assert!(Schema::from_json(r#"[{"name": "x"}, {"name": "x"}]"#).is_err());
        assert!(
            Schema::from_json(r#"[{"name": "x", "format": "email", "pattern": ".*"}]"#).is_err()
        );
    }
}
