//! Log-backed question answering over stored reports.

pub mod history;
pub mod prompt;
pub mod service;

pub use history::QaHistory;
pub use service::{AskMetadata, AskOutcome, QueryService};
