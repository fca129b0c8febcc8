//! Validators for call-time context and produced values.

use serde_json::Value;

use crate::ConfigError;

/// Validation failure reported by a [`Schema`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{}", issues.join("; "))]
pub struct SchemaError {
    pub issues: Vec<String>,
}

impl SchemaError {
    pub fn new(issue: impl Into<String>) -> Self {
        Self { issues: vec![issue.into()] }
    }
}

/// An opaque validator used for `input_schema` and `schema`.
pub trait Schema: Send + Sync {
    /// Validates `value`, returning the accepted value on success.
    fn safe_parse(&self, value: &Value) -> Result<Value, SchemaError>;

    /// The JSON Schema document sent to providers and tool callers.
    fn json_schema(&self) -> Value;

    /// Returns `true` if this schema describes an object.
    fn is_object(&self) -> bool {
        let schema = self.json_schema();
        match schema.get("type") {
            Some(Value::String(ty)) => ty == "object",
            Some(Value::Array(types)) => types.iter().any(|ty| ty == "object"),
            Some(_) => false,
            None => schema.get("properties").is_some(),
        }
    }
}

impl std::fmt::Debug for dyn Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Schema({})", self.json_schema())
    }
}

/// A [`Schema`] backed by a compiled JSON Schema document.
///
/// ```rust
/// use weave_config::{JsonSchema, Schema};
/// use serde_json::json;
///
/// let schema = JsonSchema::new(json!({
///     "type": "object",
///     "properties": { "name": { "type": "string" } },
///     "required": ["name"]
/// })).unwrap();
///
/// assert!(schema.safe_parse(&json!({ "name": "World" })).is_ok());
/// assert!(schema.safe_parse(&json!({})).is_err());
/// ```
pub struct JsonSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compiles a schema document.
    pub fn new(document: Value) -> Result<Self, ConfigError> {
        let validator = jsonschema::validator_for(&document)
            .map_err(|e| ConfigError::InvalidSchema(e.to_string()))?;
        Ok(Self { document, validator })
    }
}

impl std::fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("JsonSchema").field(&self.document).finish()
    }
}

impl Schema for JsonSchema {
    fn safe_parse(&self, value: &Value) -> Result<Value, SchemaError> {
        let issues: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|e| match e.instance_path.to_string() {
                path if path.is_empty() => e.to_string(),
                path => format!("{}: {}", path, e),
            })
            .collect();
        if issues.is_empty() {
            Ok(value.clone())
        } else {
            Err(SchemaError { issues })
        }
    }

    fn json_schema(&self) -> Value {
        self.document.clone()
    }
}
