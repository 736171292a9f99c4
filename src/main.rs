//! Demo server: the author resources under both schema-backend mounts.

use actix_web::{App, HttpServer};
use clap::Parser;
use restkit::db;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "restkit-server", about = "Authors CRUD demo on restkit")]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
    /// SQLite database path, created on first use.
    #[arg(long, default_value = "restkit.db")]
    database: PathBuf,
    /// Seed the database with the sample authors, posts, and comments.
    #[arg(long)]
    seed: bool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
    {
        eprintln!("failed to initialise logging: {error}");
    }

    let args = Args::parse();
    let pool = db::open_pool(&args.database).map_err(std::io::Error::other)?;
    db::create_tables(&pool).map_err(std::io::Error::other)?;
    if args.seed {
        db::insert_sample_data(&pool).map_err(std::io::Error::other)?;
    }

    let table = Arc::new(restkit::api::routes(&pool).map_err(std::io::Error::other)?);
    info!(bind = %args.bind, database = %args.database.display(), "starting restkit demo server");

    HttpServer::new(move || {
        let table = Arc::clone(&table);
        App::new().configure(move |cfg| table.configure(cfg))
    })
    .bind(args.bind)?
    .run()
    .await
}
