//! Database migration command.
//!
//! Migrations live in `crates/server/migrations/` and are only ever applied
//! from here; the server never migrates on start-up.

use super::{CliError, connect};

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
