//! Database initialization command

use tracing::debug;
use tutorflow_core::error::Result;

use super::helpers::CliContext;

/// Create the database file and schema
pub async fn handle(database: Option<String>, ctx: &CliContext) -> Result<()> {
    let ctx = CliContext {
        db_path: database.unwrap_or_else(|| ctx.db_path.clone()),
        config: ctx.config.clone(),
    };
    debug!("Database path: {}", ctx.db_path);

    ctx.open_store().await?;

    println!("Database initialized: {}", ctx.db_path);
    Ok(())
}
