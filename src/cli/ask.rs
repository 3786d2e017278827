use console::style;

use crate::cli::commands::AskArgs;
use crate::config::GuardConfig;
use crate::context::AppContext;
use crate::errors::GuardError;

pub async fn handle_ask(args: AskArgs, config: GuardConfig) -> Result<(), GuardError> {
    let ctx = AppContext::from_config(config)?;
    let outcome = ctx.query.ask(&args.question, &args.reports).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!("{}", outcome.answer);
    let meta = &outcome.metadata;
    println!(
        "\n{}",
        style(format!(
            "{} via {} | {} chars in, {} chars out{}",
            meta.model,
            meta.backend,
            meta.input_chars,
            meta.output_chars,
            if meta.truncated { " | logs truncated" } else { "" }
        ))
        .dim()
    );
    Ok(())
}
