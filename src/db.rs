//! SQLite access for the example resource layer.
//!
//! A plain `r2d2` pool of `rusqlite` connections plus the DDL and sample
//! data the demo app and the integration suite share. Handlers issue
//! direct SQL; there is no migration or transaction management here.

use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database setup failure.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection pool failure: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Open a pool backed by a database file, created on first use.
pub fn open_pool(path: impl AsRef<Path>) -> Result<DbPool, DbError> {
    Ok(r2d2::Pool::new(with_pragmas(SqliteConnectionManager::file(
        path,
    )))?)
}

/// Open a single-connection in-memory pool. One connection keeps every
/// checkout on the same in-memory database.
pub fn open_memory_pool() -> Result<DbPool, DbError> {
    Ok(r2d2::Pool::builder()
        .max_size(1)
        .build(with_pragmas(SqliteConnectionManager::memory()))?)
}

/// The demo schema declares foreign keys for documentation but never
/// cascades; deleting an author must leave its posts and comments behind,
/// so enforcement stays off on every connection.
fn with_pragmas(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = OFF;"))
}

/// Create the example tables if they do not exist.
pub fn create_tables(pool: &DbPool) -> Result<(), DbError> {
    let conn = pool.get()?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS authors(
            id INTEGER PRIMARY KEY,
            name VARCHAR(128)
        );
        CREATE TABLE IF NOT EXISTS posts(
            id INTEGER PRIMARY KEY,
            title VARCHAR(128),
            text VARCHAR(512),
            author_id INTEGER,
            FOREIGN KEY (author_id) REFERENCES authors(id)
        );
        CREATE TABLE IF NOT EXISTS comments(
            id INTEGER PRIMARY KEY,
            text VARCHAR(512),
            author_id INTEGER,
            post_id INTEGER,
            FOREIGN KEY (author_id) REFERENCES authors(id),
            FOREIGN KEY (post_id) REFERENCES posts(id)
        );",
    )?;
    Ok(())
}

/// Insert the well-known sample rows: three authors, six posts, seven
/// comments.
pub fn insert_sample_data(pool: &DbPool) -> Result<(), DbError> {
    let conn = pool.get()?;
    conn.execute_batch(
        "INSERT INTO authors(id, name) VALUES
            (1, 'Author 1'), (2, 'Author 2'), (3, 'Author 3');
        INSERT INTO posts(id, title, text, author_id) VALUES
            (1, 'Title 1', 'Post 1', 1),
            (2, 'Title 2', 'Post 2', 1),
            (3, 'Title 3', 'Post 3', 2),
            (4, 'Title 4', 'Post 4', 2),
            (5, 'Title 5', 'Post 5', 3),
            (6, 'Title 6', 'Post 6', 3);
        INSERT INTO comments(id, text, author_id, post_id) VALUES
            (1, 'Comment 1', 2, 1),
            (2, 'Comment 2', 3, 1),
            (3, 'Comment 3', 2, 2),
            (4, 'Comment 4', 3, 2),
            (5, 'Comment 5', 1, 3),
            (6, 'Comment 6', 2, 3),
            (7, 'Comment 7', 3, 3);",
    )?;
    Ok(())
}

/// Delete every row, keeping the tables.
pub fn truncate_tables(pool: &DbPool) -> Result<(), DbError> {
    let conn = pool.get()?;
    conn.execute_batch(
        "DELETE FROM comments;
        DELETE FROM posts;
        DELETE FROM authors;",
    )?;
    Ok(())
}

/// Drop the example tables.
pub fn drop_tables(pool: &DbPool) -> Result<(), DbError> {
    let conn = pool.get()?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS comments;
        DROP TABLE IF EXISTS posts;
        DROP TABLE IF EXISTS authors;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_data_round_trips_through_the_pool() {
        let pool = open_memory_pool().expect("pool");
        create_tables(&pool).expect("tables");
        insert_sample_data(&pool).expect("sample data");

        let count = |pool: &DbPool| -> i64 {
            let conn = pool.get().expect("connection");
            conn.query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))
                .expect("count")
        };
        assert_eq!(count(&pool), 3);

        truncate_tables(&pool).expect("truncate");
        assert_eq!(count(&pool), 0);

        drop_tables(&pool).expect("drop");
    }

    #[test]
    fn deleting_a_referenced_author_leaves_dependants_behind() {
        let pool = open_memory_pool().expect("pool");
        create_tables(&pool).expect("tables");
        insert_sample_data(&pool).expect("sample data");

        let conn = pool.get().expect("connection");
        conn.execute("DELETE FROM authors WHERE id = 1", [])
            .expect("delete referenced author");
        let posts: i64 = conn
            .query_row("SELECT COUNT(*) FROM posts WHERE author_id = 1", [], |row| {
                row.get(0)
            })
            .expect("count");
        assert_eq!(posts, 2);
    }
}
