pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod health;
pub mod llm;
pub mod models;
pub mod query;
pub mod reporting;
pub mod runner;
pub mod scans;
pub mod utils;
