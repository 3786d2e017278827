use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::commands::ScanArgs;
use crate::config::GuardConfig;
use crate::context::AppContext;
use crate::errors::GuardError;
use crate::scans::ScanExecution;
use crate::utils::formatting::format_duration;

pub async fn handle_scan(args: ScanArgs, config: GuardConfig) -> Result<(), GuardError> {
    let ctx = AppContext::from_config(config)?;
    let keys: Vec<String> = if args.all {
        ctx.registry.keys().into_iter().map(String::from).collect()
    } else {
        args.keys
    };

    // Unknown keys fail before anything runs
    for key in &keys {
        ctx.registry.get(key)?;
    }

    let mut failed = 0usize;
    for key in &keys {
        let spinner = spinner(key);
        let started = Instant::now();
        let outcome = ctx.registry.execute(key, &ctx.scans, &ctx.writer).await;
        spinner.finish_and_clear();
        match outcome {
            Ok(execution) => print_execution(&execution, &ctx, started.elapsed()),
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", style("✗").red().bold(), key, e);
            }
        }
    }

    if failed > 0 {
        return Err(GuardError::Internal(format!("{} of {} scan(s) failed", failed, keys.len())));
    }
    Ok(())
}

fn spinner(key: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("  {spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.set_message(format!("Running {}", key));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_execution(execution: &ScanExecution, ctx: &AppContext, elapsed: Duration) {
    let marker = if execution.error_count == 0 {
        style("✓").green().bold()
    } else {
        style("!").yellow().bold()
    };
    println!(
        "  {} {} {} record(s), {} error(s) in {}",
        marker,
        style(execution.key).bold(),
        execution.summary.total,
        execution.error_count,
        format_duration(elapsed.as_millis() as u64)
    );
    if let Some(status) = &execution.summary.overall_status {
        println!("      status: {}", status);
    }
    for (name, count) in &execution.summary.counts {
        println!("      {}: {}", name, count);
    }
    println!(
        "      report: {}",
        style(ctx.writer.reports_dir().join(&execution.report.name).display()).dim()
    );
}
