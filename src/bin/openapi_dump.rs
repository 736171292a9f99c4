//! Print the OpenAPI document for the demo API to stdout, for external
//! renderers and CI diffing. The document is generated from the route
//! declarations; no server is started and no database file is touched.

use clap::Parser;
use restkit::{DocGenerator, db};

#[derive(Parser, Debug)]
#[command(name = "openapi-dump", about = "Dump the demo API's OpenAPI document")]
struct Args {
    /// Document title.
    #[arg(long, default_value = "Example API")]
    title: String,
    /// Document version.
    #[arg(long, default_value = "0.1.0")]
    version: String,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    // Handlers never run here; an in-memory pool satisfies the declarations.
    let pool = db::open_memory_pool().map_err(std::io::Error::other)?;
    let table = restkit::api::routes(&pool).map_err(std::io::Error::other)?;

    let document = DocGenerator::new(args.title, args.version)
        .generate(&table)
        .map_err(std::io::Error::other)?;
    let rendered = serde_json::to_string_pretty(&document).map_err(std::io::Error::other)?;
    println!("{rendered}");
    Ok(())
}
