//! Shared helper utilities for the integration suites.
//!
//! Integration tests compile as separate crates under `tests/`, so small
//! helpers live here rather than being copy/pasted. Each test gets its own
//! scratch database file; there is no shared state between tests.

use actix_http::Request;
use actix_web::body::BoxBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, test};
use restkit::db::{self, DbPool};
use std::sync::Arc;
use tempfile::TempDir;

/// Pool over a fresh scratch database with the example tables created.
/// Keep the returned [`TempDir`] alive for the duration of the test.
pub fn empty_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().expect("scratch dir");
    let pool = db::open_pool(dir.path().join("restkit-test.db")).expect("pool");
    db::create_tables(&pool).expect("tables");
    (dir, pool)
}

/// Like [`empty_pool`], with the sample rows inserted.
pub fn seeded_pool() -> (TempDir, DbPool) {
    let (dir, pool) = empty_pool();
    db::insert_sample_data(&pool).expect("sample data");
    (dir, pool)
}

/// Actix test service wired with the demo route table.
pub async fn init_app(
    pool: &DbPool,
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error> {
    let table = Arc::new(restkit::api::routes(pool).expect("route table"));
    test::init_service(App::new().configure(move |cfg| table.configure(cfg))).await
}
