//! Author resources: a collection endpoint and an item endpoint.
//!
//! Handlers are ordinary blocking closures over the connection pool; the
//! pipeline offloads them to the worker-thread pool. Database failures map
//! to `HandlerError::internal` and stay outside the handled contract.

use crate::db::DbPool;
use crate::endpoint::{Endpoint, Handler, Hook, Operation};
use crate::error::{ApiError, ErrorKind, HandlerError};
use crate::routing::{Route, RouteTable};
use crate::schema::{FieldSet, SchemaBackend, SchemaError};
use rusqlite::params;
use serde_json::{Value, json};
use std::sync::Arc;

fn author_fields() -> FieldSet {
    FieldSet::builder("Author")
        .integer("id")
        .string("name")
        .build()
}

fn page_fields() -> FieldSet {
    FieldSet::builder("AuthorPage")
        .integer_with_default("limit", 100)
        .integer_with_default("offset", 0)
        .build()
}

fn new_author_fields() -> FieldSet {
    FieldSet::builder("NewAuthor").string("name").build()
}

fn author_id_fields() -> FieldSet {
    FieldSet::builder("AuthorId").integer("id").build()
}

fn author_update_fields() -> FieldSet {
    FieldSet::builder("AuthorUpdate")
        .integer("id")
        .string("name")
        .build()
}

fn blank_fields() -> FieldSet {
    FieldSet::builder("Blank").build()
}

fn row_to_author(row: &rusqlite::Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "name": row.get::<_, String>(1)?,
    }))
}

/// Fetch an integer the request schema has already validated.
fn require_i64(payload: &Value, key: &str) -> Result<i64, HandlerError> {
    payload
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| HandlerError::internal(format!("validated payload missing integer `{key}`")))
}

fn require_str<'p>(payload: &'p Value, key: &str) -> Result<&'p str, HandlerError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::internal(format!("validated payload missing string `{key}`")))
}

/// `GET /authors` + `POST /authors`.
pub fn collection_endpoint(
    pool: DbPool,
    backend: SchemaBackend,
) -> Result<Arc<Endpoint>, SchemaError> {
    let list_pool = pool.clone();
    let list = Operation::new(
        backend.adapter(page_fields())?,
        backend.list_adapter(author_fields())?,
        Handler::blocking(move |payload| {
            let limit = require_i64(&payload, "limit")?;
            let offset = require_i64(&payload, "offset")?;
            let conn = list_pool.get().map_err(HandlerError::internal)?;
            let mut stmt = conn
                .prepare("SELECT id, name FROM authors LIMIT ?1 OFFSET ?2")
                .map_err(HandlerError::internal)?;
            let rows = stmt
                .query_map(params![limit, offset], row_to_author)
                .map_err(HandlerError::internal)?
                .collect::<rusqlite::Result<Vec<Value>>>()
                .map_err(HandlerError::internal)?;
            Ok(Some(Value::Array(rows)))
        }),
    )
    .doc("Retrieves the list of authors, limited with the `limit` and `offset` fields.");

    let create_pool = pool;
    let create = Operation::new(
        backend.adapter(new_author_fields())?,
        backend.adapter(author_fields())?,
        Handler::blocking(move |payload| {
            let conn = create_pool.get().map_err(HandlerError::internal)?;
            conn.execute(
                "INSERT INTO authors (name) VALUES (?1)",
                params![require_str(&payload, "name")?],
            )
            .map_err(HandlerError::internal)?;
            let author = conn
                .query_row(
                    "SELECT id, name FROM authors WHERE id = last_insert_rowid()",
                    [],
                    row_to_author,
                )
                .map_err(HandlerError::internal)?;
            Ok(Some(author))
        }),
    )
    .doc(
        "Creates a new author and returns the created record.\n\
         ---\n\
         summary: Create author\n\
         tags:\n  - authors\n",
    );

    Ok(Endpoint::builder().get(list).post(create).build())
}

/// `GET`/`PUT`/`DELETE /authors/{id}`.
pub fn item_endpoint(pool: DbPool, backend: SchemaBackend) -> Result<Arc<Endpoint>, SchemaError> {
    let exists_pool = pool.clone();
    let exists_hook = Hook::blocking(move |payload| {
        let id = require_i64(&payload, "id")?;
        let conn = exists_pool.get().map_err(HandlerError::internal)?;
        let exists: i64 = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM authors WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )
            .map_err(HandlerError::internal)?;
        if exists == 0 {
            return Err(ApiError::not_found().into());
        }
        Ok(())
    });

    let get_pool = pool.clone();
    let get = Operation::new(
        backend.adapter(author_id_fields())?,
        backend.adapter(author_fields())?,
        Handler::blocking(move |payload| {
            let conn = get_pool.get().map_err(HandlerError::internal)?;
            let author = conn
                .query_row(
                    "SELECT id, name FROM authors WHERE id = ?1",
                    params![require_i64(&payload, "id")?],
                    row_to_author,
                )
                .map_err(HandlerError::internal)?;
            Ok(Some(author))
        }),
    )
    .validate(exists_hook)
    .doc("Retrieves the author for the given id.");

    let update_pool = pool.clone();
    let update = Operation::new(
        backend.adapter(author_update_fields())?,
        backend.adapter(author_fields())?,
        Handler::blocking(move |payload| {
            let id = require_i64(&payload, "id")?;
            let conn = update_pool.get().map_err(HandlerError::internal)?;
            conn.execute(
                "UPDATE authors SET name = ?1 WHERE id = ?2",
                params![require_str(&payload, "name")?, id],
            )
            .map_err(HandlerError::internal)?;
            let author = conn
                .query_row(
                    "SELECT id, name FROM authors WHERE id = ?1",
                    params![id],
                    row_to_author,
                )
                .map_err(HandlerError::internal)?;
            Ok(Some(author))
        }),
    )
    .doc("Updates the author for the given id.");

    let delete_pool = pool;
    let delete = Operation::new(
        backend.adapter(author_id_fields())?,
        backend.adapter(blank_fields())?,
        Handler::blocking(move |payload| {
            let conn = delete_pool.get().map_err(HandlerError::internal)?;
            conn.execute(
                "DELETE FROM authors WHERE id = ?1",
                params![require_i64(&payload, "id")?],
            )
            .map_err(HandlerError::internal)?;
            Ok(None)
        }),
    )
    .doc("Deletes the record.");

    Ok(Endpoint::builder()
        .get(get)
        .put(update)
        .delete(delete)
        .document_error(404, ErrorKind::NotFound)
        .build())
}

/// Author routes for one backend.
pub fn routes(pool: DbPool, backend: SchemaBackend) -> Result<RouteTable, SchemaError> {
    Ok(RouteTable::new()
        .route(Route::new(
            "/authors",
            collection_endpoint(pool.clone(), backend)?,
        ))
        .route(Route::new("/authors/{id}", item_endpoint(pool, backend)?)))
}
