pub mod ask;
pub mod commands;
pub mod history;
pub mod reports;
pub mod scan;
pub mod serve;
pub mod validate;

pub use commands::{Cli, Commands};
