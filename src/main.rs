use std::path::PathBuf;

use clap::Parser;
use guardstick::cli::{self, Cli, Commands};
use guardstick::config;
use guardstick::errors::GuardError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_writer(std::io::stderr)
            .init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            GuardError::Config(_) => 2,
            GuardError::InvalidRequest(_) => 3,
            GuardError::NotFound(_) | GuardError::NoValidLogs(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: Cli) -> Result<(), GuardError> {
    let command = match cli.command {
        Commands::Validate(args) => return cli::validate::handle_validate(args).await,
        other => other,
    };

    let config_path = cli.config.as_deref().map(PathBuf::from);
    let config = config::load_config(config_path.as_deref()).await?;

    match command {
        Commands::Serve(args) => cli::serve::handle_serve(args, config).await,
        Commands::Scan(args) => cli::scan::handle_scan(args, config).await,
        Commands::Scans => {
            for def in guardstick::scans::ScanRegistry::standard().definitions() {
                println!("{:<22} {}", def.key, def.display_name);
            }
            Ok(())
        }
        Commands::Reports(args) => cli::reports::handle_reports(args, config).await,
        Commands::Ask(args) => cli::ask::handle_ask(args, config).await,
        Commands::History => cli::history::handle_history(config).await,
        Commands::Validate(_) => Ok(()),
    }
}
