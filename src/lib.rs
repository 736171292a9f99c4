//! Declarative REST endpoints for actix-web.
//!
//! `restkit` reduces the boilerplate of REST resources: declare a schema
//! per HTTP method, plug in a handler, and the [`endpoint`] pipeline takes
//! care of payload extraction, validation, dispatch, error shaping, and
//! response serialization. The [`schema`] module offers two
//! interchangeable validation backends; [`openapi`] generates an OpenAPI
//! v3 document from the same declarations. The [`api`] and [`db`] modules
//! hold the SQLite-backed demo resources.

pub mod api;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod openapi;
pub mod routing;
pub mod schema;

pub use endpoint::{Endpoint, Handler, Hook, Operation};
pub use error::{ApiError, ErrorKind, HandlerError};
pub use openapi::{DocError, DocGenerator};
pub use routing::{EndpointInfo, Route, RouteTable};
pub use schema::{FieldSet, FieldType, ListAdapter, SchemaAdapter, SchemaBackend};
