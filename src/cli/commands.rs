use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "guardstick",
    version,
    about = "macOS security auditing toolkit with a log-backed model assistant"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and dashboard
    Serve(ServeArgs),
    /// Run one or more scan modules and save their reports
    Scan(ScanArgs),
    /// List available scan modules
    Scans,
    /// List or delete saved reports
    Reports(ReportsArgs),
    /// Ask the model a question about saved reports
    Ask(AskArgs),
    /// Show recent question/answer history
    History,
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Listen address (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Scan keys to run, in order
    #[arg(required_unless_present = "all")]
    pub keys: Vec<String>,

    /// Run every registered scan
    #[arg(long, conflicts_with = "keys")]
    pub all: bool,
}

#[derive(Args, Clone)]
pub struct ReportsArgs {
    #[command(subcommand)]
    pub action: ReportsAction,
}

#[derive(Subcommand, Clone)]
pub enum ReportsAction {
    /// List saved reports, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete reports by file name
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Args, Clone)]
pub struct AskArgs {
    /// Question to ask
    #[arg(short, long)]
    pub question: String,

    /// Report file to include (repeatable)
    #[arg(short, long = "report", required = true)]
    pub reports: Vec<String>,

    /// Print response metadata as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
