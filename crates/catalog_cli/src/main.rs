//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `catalog_core` linkage with deterministic output.
//! - With a database path argument, open it through the configured pool and
//!   print active entity counts.
//!
//! Usage: `catalog_cli [DB_PATH]`

use catalog_core::{CatalogConfig, CatalogService, RequestContext};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("catalog_core ping={}", catalog_core::ping());
    println!("catalog_core version={}", catalog_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match print_counts(db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("catalog_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_counts(db_path: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CatalogConfig::load()?;
    config.db_path = db_path;
    config.validate()?;
    catalog_core::init_logging_from_config(&config)?;

    let service = CatalogService::new(config.open_pool()?);
    let ctx = RequestContext::background();
    let books = service.list_books(&ctx, 1, 1)?.count;
    let authors = service.list_authors(&ctx, 1, 1)?.count;
    let categories = service.list_categories(&ctx, 1, 1)?.count;

    info!("event=cli_counts module=cli status=ok books={books} authors={authors} categories={categories}");
    println!("books={books} authors={authors} categories={categories}");
    Ok(())
}
