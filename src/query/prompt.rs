//! Prompt assembly under a character budget.
//!
//! The budget covers the question plus the log text. When the two do not
//! fit, the question is kept (capped to a quarter of the budget) and the
//! end of the log text fills the rest, behind [`TRUNCATION_MARKER`].

use crate::utils::truncation::{char_len, keep_head, keep_tail};

pub const TRUNCATION_MARKER: &str = "[... earlier log content truncated ...]\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub text: String,
    pub truncated: bool,
}

/// Concatenate report contents, each behind a header naming its file.
pub fn join_logs<'a, I>(reports: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut joined = String::new();
    for (name, content) in reports {
        joined.push_str("=== ");
        joined.push_str(name);
        joined.push_str(" ===\n");
        joined.push_str(content);
        if !content.ends_with('\n') {
            joined.push('\n');
        }
    }
    joined
}

pub fn build_prompt(preamble: &str, question: &str, logs: &str, budget: usize) -> BuiltPrompt {
    if char_len(question) + char_len(logs) <= budget {
        return assemble(preamble, question, logs, false);
    }

    let question_cap = (budget / 4).max(1);
    let mut truncated = false;

    let question = if char_len(question) > question_cap {
        truncated = true;
        keep_head(question, question_cap)
    } else {
        question
    };

    let remaining = budget.saturating_sub(char_len(question)).max(1);
    let excerpt = if char_len(logs) <= remaining {
        logs.to_string()
    } else {
        truncated = true;
        let marker_len = char_len(TRUNCATION_MARKER);
        if remaining > marker_len * 2 {
            format!("{}{}", TRUNCATION_MARKER, keep_tail(logs, remaining - marker_len))
        } else {
            keep_tail(logs, remaining).to_string()
        }
    };

    assemble(preamble, question, &excerpt, truncated)
}

fn assemble(preamble: &str, question: &str, excerpt: &str, truncated: bool) -> BuiltPrompt {
    let body = format!("User: {}\n\nLogs:\n{}", question, excerpt);
    let text = if preamble.trim().is_empty() {
        body
    } else {
        format!("{}\n\n{}", preamble.trim(), body)
    };
    BuiltPrompt { text, truncated }
}
