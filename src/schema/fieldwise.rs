//! Backend B: per-field coercing validation.
//!
//! Checks each declared field in declaration order and reports failures as
//! a flat mapping of field name → message, deliberately unlike the
//! JSON-schema backend's array-of-objects payload.

use super::{FieldSet, FieldType, SchemaAdapter, ValidationFailure};
use serde_json::{Map, Value, json};

pub struct FieldwiseAdapter {
    fields: FieldSet,
}

impl FieldwiseAdapter {
    pub fn new(fields: FieldSet) -> Self {
        Self { fields }
    }

    fn validate(&self, raw: &Value) -> Result<Value, ValidationFailure> {
        let Some(map) = raw.as_object() else {
            return Err(ValidationFailure::new(json!({
                "_schema": "Must be an object."
            })));
        };
        let conformed = self.fields.conform(map);

        let mut errors = Map::new();
        for field in self.fields.fields() {
            match conformed.get(&field.name) {
                // Conform applies defaults, so an absent field here is a
                // missing required field.
                None => {
                    errors.insert(field.name.clone(), json!("This field is required."));
                }
                Some(value) => {
                    if !matches_type(field.ty, value) {
                        errors.insert(field.name.clone(), json!(type_message(field.ty)));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(Value::Object(conformed))
        } else {
            Err(ValidationFailure::new(Value::Object(errors)))
        }
    }
}

impl SchemaAdapter for FieldwiseAdapter {
    fn load(&self, raw: &Value) -> Result<Value, ValidationFailure> {
        self.validate(raw)
    }

    fn dump(&self, value: &Value) -> Result<Value, ValidationFailure> {
        self.validate(value)
    }

    fn fragment(&self) -> Value {
        self.fields.fragment()
    }
}

fn matches_type(ty: FieldType, value: &Value) -> bool {
    match ty {
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::String => value.is_string(),
        FieldType::Boolean => value.is_boolean(),
    }
}

fn type_message(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Integer => "Must be an integer.",
        FieldType::Float => "Must be a number.",
        FieldType::String => "Must be a string.",
        FieldType::Boolean => "Must be a boolean.",
    }
}
