//! OpenAPI v3 document generation.
//!
//! Walks the declared route tree and assembles one mapping from path →
//! method → operation object, reading the same schema declarations the
//! pipeline validates with. Best-effort by design: no schema
//! deduplication, no structural non-200 success codes (error responses
//! come only from each endpoint's documented-error table), and no
//! conformance validation of the produced document.

use crate::routing::RouteTable;
use serde_json::{Map, Value, json};

/// Documentation could not be generated.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    /// The base document passed to [`DocGenerator::with_base`] was not a
    /// mapping.
    #[error("base document must be a mapping")]
    BaseNotMapping,
    /// An operation's doc text failed to parse as YAML.
    #[error("malformed documentation YAML for {method} {path}")]
    DocYaml {
        path: String,
        method: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Assembles the OpenAPI document for a route table.
pub struct DocGenerator {
    base: Value,
}

impl DocGenerator {
    /// A generator with a minimal `openapi`/`info` preamble.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: json!({
                "openapi": "3.0.0",
                "info": {
                    "title": title.into(),
                    "version": version.into(),
                },
            }),
        }
    }

    /// A generator seeded with a caller-supplied base document. Existing
    /// keys are preserved; `paths` is added if absent.
    pub fn with_base(base: Value) -> Self {
        Self { base }
    }

    /// Build the document for every documented (path, method) pair.
    pub fn generate(&self, table: &RouteTable) -> Result<Value, DocError> {
        let mut document = match &self.base {
            Value::Object(map) => map.clone(),
            _ => return Err(DocError::BaseNotMapping),
        };

        let mut paths = match document.remove("paths") {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };

        for info in table.flatten() {
            let Some(operation) = info.endpoint.operation(&info.http_method) else {
                continue;
            };

            let description =
                parse_docstring(operation.doc_text()).map_err(|source| DocError::DocYaml {
                    path: info.path.clone(),
                    method: info.method.to_owned(),
                    source,
                })?;

            let media_type = info.endpoint.media_type();
            let mut responses = Map::new();
            responses.insert(
                "200".to_owned(),
                response_entry("Successful response", media_type, operation.response_fragment()),
            );
            for (status, kind) in info.endpoint.error_docs() {
                responses.insert(
                    status.to_string(),
                    response_entry(kind.description(), media_type, kind.schema()),
                );
            }

            let mut target = Map::new();
            target.insert("description".to_owned(), description);
            target.insert("parameters".to_owned(), operation.request_fragment());
            target.insert("responses".to_owned(), Value::Object(responses));

            let path_item = paths
                .entry(info.path.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(item) = path_item.as_object_mut() {
                item.insert(info.method.to_owned(), Value::Object(target));
            }
        }

        document.insert("paths".to_owned(), Value::Object(paths));
        Ok(Value::Object(document))
    }
}

/// One response object: a description plus the schema keyed under the
/// endpoint's media type.
fn response_entry(description: &str, media_type: &str, schema: Value) -> Value {
    let mut media = Map::new();
    media.insert(media_type.to_owned(), json!({ "schema": schema }));

    let mut entry = Map::new();
    entry.insert("description".to_owned(), json!(description));
    entry.insert("content".to_owned(), Value::Object(media));
    Value::Object(entry)
}

/// Parse an operation's doc text: only the part after the *last* `---`
/// marker is considered, and it is read as YAML. Absent or empty docs
/// yield an empty mapping; a YAML parse failure propagates.
fn parse_docstring(doc: Option<&str>) -> Result<Value, serde_yaml::Error> {
    let Some(text) = doc else {
        return Ok(json!({}));
    };
    let tail = text.rsplit("---").next().unwrap_or(text);
    let trimmed = tail.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    let parsed: Value = serde_yaml::from_str(trimmed)?;
    if parsed.is_null() {
        Ok(json!({}))
    } else {
        Ok(parsed)
    }
}
