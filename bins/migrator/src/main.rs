//! Reference schema runner for rlsguard validation databases.
//!
//! Usage:
//!   migrator up      - Apply the reference schema
//!   migrator down    - Drop it
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop everything and re-apply
//!
//! Reads `DATABASE_URL`. Never point it at a production database.

use rlsguard_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Run the migrator CLI (it sets up its own tracing)
    cli::run_cli(Migrator).await;
}
