use console::style;

use crate::cli::commands::{ReportsAction, ReportsArgs};
use crate::config::GuardConfig;
use crate::errors::GuardError;
use crate::reporting::ReportCatalog;

pub async fn handle_reports(args: ReportsArgs, config: GuardConfig) -> Result<(), GuardError> {
    let catalog = ReportCatalog::new(&config.paths.reports_dir);
    match args.action {
        ReportsAction::List { json } => {
            let entries = catalog.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No reports in {}", catalog.reports_dir().display());
                return Ok(());
            }
            for entry in entries {
                println!(
                    "  {}  {:>10}  {}",
                    style(&entry.timestamp).dim(),
                    entry.size,
                    entry.name
                );
            }
        }
        ReportsAction::Delete { names } => {
            let outcome = catalog.delete(&names).await?;
            for name in &outcome.deleted {
                println!("  {} deleted {}", style("✓").green(), name);
            }
            for name in &outcome.not_found {
                println!("  {} not found {}", style("-").dim(), name);
            }
        }
    }
    Ok(())
}
