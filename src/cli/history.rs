use console::style;

use crate::config::GuardConfig;
use crate::errors::GuardError;
use crate::query::QaHistory;

pub async fn handle_history(config: GuardConfig) -> Result<(), GuardError> {
    let history = QaHistory::new(config.paths.history_file(), config.llm.history_limit);
    let entries = history.entries().await;
    if entries.is_empty() {
        println!("No questions asked yet.");
        return Ok(());
    }
    for entry in entries.iter().rev() {
        println!(
            "{} {}",
            style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            style(&entry.question).bold()
        );
        println!("  logs: {}", entry.logs_analyzed.join(", "));
        println!("  {}\n", entry.response.trim());
    }
    Ok(())
}
