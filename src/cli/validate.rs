use std::path::PathBuf;

use crate::cli::commands::ValidateArgs;
use crate::config::{self, credentials::mask_secret};
use crate::errors::GuardError;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), GuardError> {
    let path = PathBuf::from(&args.config);
    let config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    println!("  server:  {}:{}", config.server.host, config.server.port);
    println!("  reports: {}", config.paths.reports_dir.display());
    println!("  backend: {} ({})", config.llm.backend, config.llm.model);
    if let Some(key) = &config.llm.api_key {
        println!("  api key: {}", mask_secret(key));
    }
    Ok(())
}
