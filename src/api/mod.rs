//! Example resource layer: authors CRUD declared once per schema backend.

pub mod authors;

use crate::db::DbPool;
use crate::routing::RouteTable;
use crate::schema::{SchemaBackend, SchemaError};

/// Mount prefix for the JSON-schema backend.
pub const JSONSCHEMA_MOUNT: &str = "/jsonschema-api";
/// Mount prefix for the fieldwise backend.
pub const FIELDWISE_MOUNT: &str = "/fieldwise-api";

/// The demo route table: the same author resources mounted once per
/// backend, so the two error contracts can be exercised side by side.
pub fn routes(pool: &DbPool) -> Result<RouteTable, SchemaError> {
    Ok(RouteTable::new()
        .mount(
            JSONSCHEMA_MOUNT,
            authors::routes(pool.clone(), SchemaBackend::JsonSchema)?,
        )
        .mount(
            FIELDWISE_MOUNT,
            authors::routes(pool.clone(), SchemaBackend::Fieldwise)?,
        ))
}
