//! Configuration inspection command

use clap::Subcommand;
use tutorflow_core::{error::Result, EngineConfig};

use super::helpers::CliContext;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Print the built-in defaults as TOML
    Defaults,
}

/// Handle configuration command
pub async fn handle(action: ConfigAction, ctx: &CliContext) -> Result<()> {
    let rendered = match action {
        ConfigAction::Show => {
            println!("# database: {}", ctx.db_path);
            ctx.config.to_toml()?
        }
        ConfigAction::Defaults => EngineConfig::default().to_toml()?,
    };
    print!("{}", rendered);
    Ok(())
}
