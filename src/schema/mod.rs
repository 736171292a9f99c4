//! Schema adapters: one declarative field-set model, two interchangeable
//! validation backends.
//!
//! Both backends satisfy the same [`SchemaAdapter`] contract and produce
//! semantically equivalent validated output for equivalent input. Their
//! *error* payloads differ on purpose: the JSON-schema backend reports an
//! array of `{location, message, kind}` objects while the fieldwise backend
//! reports a flat field-name → message mapping. Callers must not rely on a
//! unified error shape.

mod fields;
mod fieldwise;
mod json_schema;

pub use fields::{Field, FieldSet, FieldSetBuilder, FieldType};
pub use fieldwise::FieldwiseAdapter;
pub use json_schema::JsonSchemaAdapter;

use serde_json::{Value, json};
use std::sync::Arc;

/// Validation failed; `errors` carries the backend-specific payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("schema validation failed")]
pub struct ValidationFailure {
    errors: Value,
}

impl ValidationFailure {
    pub fn new(errors: Value) -> Self {
        Self { errors }
    }

    /// Backend-specific structured errors.
    pub fn errors(&self) -> &Value {
        &self.errors
    }

    pub fn into_errors(self) -> Value {
        self.errors
    }
}

/// Schema declaration could not be compiled into an adapter.
///
/// Only the JSON-schema backend can fail this way; the error is surfaced at
/// declaration time, never during request handling.
#[derive(Debug, thiserror::Error)]
#[error("schema compilation failed for `{schema}`: {message}")]
pub struct SchemaError {
    schema: String,
    message: String,
}

impl SchemaError {
    pub(crate) fn new(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            message: message.into(),
        }
    }
}

/// Uniform contract over the validation backends.
///
/// `load` validates and coerces a raw mapping, applying declared defaults;
/// `dump` re-validates a handler's return value, acting as serializer and
/// contract check at once; `fragment` exposes the documentation view and has
/// no effect on request handling.
pub trait SchemaAdapter: Send + Sync {
    fn load(&self, raw: &Value) -> Result<Value, ValidationFailure>;

    fn dump(&self, value: &Value) -> Result<Value, ValidationFailure>;

    fn fragment(&self) -> Value;
}

/// Repeats an inner adapter over a sequence, preserving order.
///
/// The first failing item fails the whole operation; there is no
/// partial-success mode.
pub struct ListAdapter {
    inner: Arc<dyn SchemaAdapter>,
}

impl ListAdapter {
    pub fn new(inner: Arc<dyn SchemaAdapter>) -> Self {
        Self { inner }
    }

    fn apply<F>(&self, value: &Value, op: F) -> Result<Value, ValidationFailure>
    where
        F: Fn(&Value) -> Result<Value, ValidationFailure>,
    {
        let Some(items) = value.as_array() else {
            return Err(ValidationFailure::new(json!("Must be an array.")));
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(op(item)?);
        }
        Ok(Value::Array(out))
    }
}

impl SchemaAdapter for ListAdapter {
    fn load(&self, raw: &Value) -> Result<Value, ValidationFailure> {
        self.apply(raw, |item| self.inner.load(item))
    }

    fn dump(&self, value: &Value) -> Result<Value, ValidationFailure> {
        self.apply(value, |item| self.inner.dump(item))
    }

    fn fragment(&self) -> Value {
        json!({
            "type": "array",
            "items": self.inner.fragment(),
        })
    }
}

/// Strategy selector for the two backends. Endpoint declarations receive
/// one of these and stay agnostic of the concrete adapter in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaBackend {
    /// Backend A: compiled JSON-schema validation, array-shaped errors.
    JsonSchema,
    /// Backend B: per-field coercing validation, mapping-shaped errors.
    Fieldwise,
}

impl SchemaBackend {
    /// Build an adapter for a single mapping.
    pub fn adapter(self, fields: FieldSet) -> Result<Arc<dyn SchemaAdapter>, SchemaError> {
        match self {
            Self::JsonSchema => Ok(Arc::new(JsonSchemaAdapter::new(fields)?)),
            Self::Fieldwise => Ok(Arc::new(FieldwiseAdapter::new(fields))),
        }
    }

    /// Build an adapter for a sequence of mappings.
    pub fn list_adapter(self, fields: FieldSet) -> Result<Arc<dyn SchemaAdapter>, SchemaError> {
        Ok(Arc::new(ListAdapter::new(self.adapter(fields)?)))
    }
}
