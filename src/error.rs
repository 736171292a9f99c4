//! HTTP-mapped failures raised by endpoint pipelines.
//!
//! Keep resource handlers free of transport concerns by translating the
//! closed set of [`ApiError`] kinds into JSON responses here. Anything that
//! is not an `ApiError` is a programming error and falls through to actix's
//! default 500 handling rather than being dressed up as a client failure.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::{Value, json};

/// Closed set of failure kinds the pipeline knows how to answer.
///
/// The generated documentation indexes these by status code while the
/// runtime catches them by type; a kind that should appear in the docs must
/// also be registered in the owning endpoint's error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request payload failed schema validation (422).
    InvalidRequest,
    /// Request conflicts with existing state (409).
    Conflict,
    /// Referenced resource does not exist (404).
    NotFound,
}

impl ErrorKind {
    /// Status code the kind maps to.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Human-readable description used in both response bodies and docs.
    pub fn description(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid request",
            Self::Conflict => "Conflict",
            Self::NotFound => "Not found",
        }
    }

    /// Static JSON-schema fragment for the error body, used by the OpenAPI
    /// generator when a kind is registered in an endpoint's error table.
    pub fn schema(self) -> Value {
        json!({
            "title": self.title(),
            "type": "object",
            "properties": {
                "description": { "title": "Description", "type": "string" },
                "errors": { "title": "Errors", "default": null },
            },
            "required": ["description"],
        })
    }

    fn title(self) -> &'static str {
        match self {
            Self::InvalidRequest => "InvalidRequest",
            Self::Conflict => "Conflict",
            Self::NotFound => "NotFound",
        }
    }
}

/// Handled endpoint failure: a kind, a description, and optional structured
/// validation errors whose shape is owned by the schema backend that raised
/// them.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{description}")]
pub struct ApiError {
    kind: ErrorKind,
    description: String,
    errors: Option<Value>,
}

impl ApiError {
    /// A 422 carrying the backend-specific validation errors payload.
    pub fn invalid_request(errors: Value) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            description: ErrorKind::InvalidRequest.description().to_owned(),
            errors: Some(errors),
        }
    }

    /// A 409 with no structured errors.
    pub fn conflict() -> Self {
        Self::bare(ErrorKind::Conflict)
    }

    /// A 404 with no structured errors.
    pub fn not_found() -> Self {
        Self::bare(ErrorKind::NotFound)
    }

    fn bare(kind: ErrorKind) -> Self {
        Self {
            kind,
            description: kind.description().to_owned(),
            errors: None,
        }
    }

    /// Replace the default description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Structured errors payload, if any.
    pub fn errors(&self) -> Option<&Value> {
        self.errors.as_ref()
    }

    /// Response body: `{"description": ..., "errors": ...}` with `errors`
    /// serialized as `null` when absent.
    pub fn to_body(&self) -> Value {
        json!({
            "description": self.description,
            "errors": self.errors,
        })
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.to_body())
    }
}

/// Failures a handler or validation hook may surface.
///
/// `Api` failures are recovered at the pipeline boundary and shaped into
/// JSON; `Internal` failures deliberately stay outside the handled contract
/// and end up as an unstructured 500.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Handled, client-facing failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Unhandled failure (database errors, pool exhaustion, ...).
    #[error("handler failure: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary error as an unhandled failure.
    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(error.into())
    }
}
