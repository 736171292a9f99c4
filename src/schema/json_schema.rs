//! Backend A: validation through a compiled JSON schema.
//!
//! The field set's documentation fragment doubles as the validation schema;
//! it is compiled once at declaration time with the `jsonschema` crate.
//! Failures surface as an array of `{location, message, kind}` objects.

use super::{FieldSet, SchemaAdapter, SchemaError, ValidationFailure};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{Value, json};

pub struct JsonSchemaAdapter {
    fields: FieldSet,
    validator: Validator,
}

impl JsonSchemaAdapter {
    /// Compile the field set's schema. Fails only on a malformed
    /// declaration, surfaced before any request is served.
    pub fn new(fields: FieldSet) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&fields.fragment())
            .map_err(|error| SchemaError::new(fields.name(), error.to_string()))?;
        Ok(Self { fields, validator })
    }

    fn validate(&self, raw: &Value) -> Result<Value, ValidationFailure> {
        let conformed = match raw.as_object() {
            Some(map) => Value::Object(self.fields.conform(map)),
            // Let the schema report the type mismatch.
            None => raw.clone(),
        };
        let errors: Vec<Value> = self
            .validator
            .iter_errors(&conformed)
            .map(|error| shape_error(&error))
            .collect();
        if errors.is_empty() {
            Ok(conformed)
        } else {
            Err(ValidationFailure::new(Value::Array(errors)))
        }
    }
}

impl SchemaAdapter for JsonSchemaAdapter {
    fn load(&self, raw: &Value) -> Result<Value, ValidationFailure> {
        self.validate(raw)
    }

    // Dump re-validates the handler's output under the same rules.
    fn dump(&self, value: &Value) -> Result<Value, ValidationFailure> {
        self.validate(value)
    }

    fn fragment(&self) -> Value {
        self.fields.fragment()
    }
}

/// One `{location, message, kind}` error object.
fn shape_error(error: &ValidationError<'_>) -> Value {
    let path = error.instance_path().to_string();
    let mut location: Vec<Value> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| json!(segment))
        .collect();
    // Missing-property errors point at the instance root; name the field
    // instead so clients can attribute the failure.
    if location.is_empty() {
        if let ValidationErrorKind::Required { property } = error.kind() {
            location.push(property.clone());
        }
    }
    json!({
        "location": location,
        "message": error.to_string(),
        "kind": kind_tag(error.kind()),
    })
}

fn kind_tag(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::Required { .. } => "required",
        ValidationErrorKind::Type { .. } => "type",
        ValidationErrorKind::AdditionalProperties { .. } => "additional_properties",
        _ => "invalid",
    }
}
