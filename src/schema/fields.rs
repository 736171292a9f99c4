//! Declarative field sets.
//!
//! A [`FieldSet`] is a named, insertion-ordered collection of typed fields
//! with optional defaults. It is the single schema declaration both
//! validation backends interpret; the backends differ only in how they
//! check values and how they report failures.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

/// Primitive types a field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    String,
    Boolean,
}

impl FieldType {
    /// JSON-schema type keyword for the primitive.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

/// One declared field. A field with a default is optional; without one it
/// is required.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub default: Option<Value>,
}

/// Named, ordered set of typed fields.
#[derive(Debug, Clone)]
pub struct FieldSet {
    name: String,
    fields: IndexMap<String, Field>,
}

impl FieldSet {
    /// Start declaring a field set with the given schema title.
    pub fn builder(name: impl Into<String>) -> FieldSetBuilder {
        FieldSetBuilder {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Schema title.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Produce a mapping restricted to the declared fields: defaults applied
    /// for absent optional fields, string inputs coerced toward the declared
    /// type where parseable. Unparseable values pass through unchanged so
    /// the owning backend reports them.
    ///
    /// Undeclared keys are dropped, mirroring how the flattened request
    /// payload carries sections (path, query, body) the schema never asked
    /// for.
    pub fn conform(&self, raw: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for field in self.fields.values() {
            match raw.get(&field.name) {
                Some(value) => {
                    out.insert(field.name.clone(), coerce(field.ty, value));
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }
        out
    }

    /// JSON-schema-shaped fragment describing the field set. Documentation
    /// only; request handling never consults it directly.
    pub fn fragment(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in self.fields.values() {
            let mut property = Map::new();
            property.insert("type".to_owned(), json!(field.ty.json_type()));
            if let Some(default) = &field.default {
                property.insert("default".to_owned(), default.clone());
            }
            properties.insert(field.name.clone(), Value::Object(property));
            if field.default.is_none() {
                required.push(json!(field.name));
            }
        }

        let mut fragment = Map::new();
        fragment.insert("title".to_owned(), json!(self.name));
        fragment.insert("type".to_owned(), json!("object"));
        fragment.insert("properties".to_owned(), Value::Object(properties));
        if !required.is_empty() {
            fragment.insert("required".to_owned(), Value::Array(required));
        }
        Value::Object(fragment)
    }
}

/// Builder for [`FieldSet`]. Re-declaring a field name replaces the earlier
/// declaration.
pub struct FieldSetBuilder {
    name: String,
    fields: IndexMap<String, Field>,
}

impl FieldSetBuilder {
    /// Declare a required field of the given type.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            Field {
                name,
                ty,
                default: None,
            },
        );
        self
    }

    /// Declare an optional field with a default value.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        default: impl Into<Value>,
    ) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            Field {
                name,
                ty,
                default: Some(default.into()),
            },
        );
        self
    }

    /// Required integer field.
    pub fn integer(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Integer)
    }

    /// Optional integer field with a default.
    pub fn integer_with_default(self, name: impl Into<String>, default: i64) -> Self {
        self.field_with_default(name, FieldType::Integer, default)
    }

    /// Required string field.
    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::String)
    }

    /// Required boolean field.
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Boolean)
    }

    /// Required float field.
    pub fn float(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Float)
    }

    /// Finish the declaration.
    pub fn build(self) -> FieldSet {
        FieldSet {
            name: self.name,
            fields: self.fields,
        }
    }
}

/// Coerce a string value toward the declared type. Anything that does not
/// parse is returned unchanged for the backend to flag.
fn coerce(ty: FieldType, value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let text = text.trim();
    match ty {
        FieldType::Integer => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        FieldType::Float => text
            .parse::<f64>()
            .ok()
            .and_then(|parsed| serde_json::Number::from_f64(parsed).map(Value::Number))
            .unwrap_or_else(|| value.clone()),
        FieldType::Boolean => match text {
            "true" | "1" => json!(true),
            "false" | "0" => json!(false),
            _ => value.clone(),
        },
        FieldType::String => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pagination() -> FieldSet {
        FieldSet::builder("Pagination")
            .integer_with_default("limit", 100)
            .integer_with_default("offset", 0)
            .build()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn conform_applies_defaults_for_absent_optional_fields() {
        let conformed = pagination().conform(&Map::new());
        assert_eq!(Value::Object(conformed), json!({"limit": 100, "offset": 0}));
    }

    #[test]
    fn conform_coerces_string_inputs_toward_declared_types() {
        let fields = FieldSet::builder("Coerce")
            .integer("id")
            .float("score")
            .boolean("active")
            .build();
        let raw = object(json!({"id": "3", "score": "1.5", "active": "true"}));
        let conformed = fields.conform(&raw);
        assert_eq!(
            Value::Object(conformed),
            json!({"id": 3, "score": 1.5, "active": true})
        );
    }

    #[test]
    fn conform_leaves_unparseable_values_for_the_backend() {
        let fields = FieldSet::builder("Strict").integer("id").build();
        let raw = object(json!({"id": "three"}));
        let conformed = fields.conform(&raw);
        assert_eq!(Value::Object(conformed), json!({"id": "three"}));
    }

    #[test]
    fn conform_drops_undeclared_keys() {
        let raw = object(json!({"limit": 10, "debug": true}));
        let conformed = pagination().conform(&raw);
        assert_eq!(Value::Object(conformed), json!({"limit": 10, "offset": 0}));
    }

    #[test]
    fn fragment_lists_required_fields_and_defaults() {
        let fields = FieldSet::builder("Author")
            .integer("id")
            .string("name")
            .build();
        assert_eq!(
            fields.fragment(),
            json!({
                "title": "Author",
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": "string"},
                },
                "required": ["id", "name"],
            })
        );

        let fragment = pagination().fragment();
        assert_eq!(fragment["properties"]["limit"]["default"], 100);
        assert!(fragment.get("required").is_none());
    }
}
