use crate::errors::GuardError;
use crate::models::ScanBuilder;

/// Tracks lines a parser could not interpret so they end up in the
/// report's `errors` instead of vanishing.
#[derive(Debug, Default)]
pub struct Unparsed {
    count: usize,
    first: Option<String>,
}

impl Unparsed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, line: &str) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(line.trim().to_string());
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// One aggregated entry per sub-check.
    pub fn report(self, out: &mut ScanBuilder, context: &str) {
        if let Some(first) = self.first {
            out.record_error(
                format!("{}: unparsed output", context),
                GuardError::ParseAmbiguous(format!(
                    "{} line(s) not recognized; first: {:?}",
                    self.count, first
                )),
            );
        }
    }
}

/// Non-blank, trimmed lines.
pub fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparsed_aggregates() {
        let mut out = ScanBuilder::new("t", "T", "guardstick");
        let mut unparsed = Unparsed::new();
        unparsed.note("  ??? ");
        unparsed.note("garbage");
        assert_eq!(unparsed.count(), 2);
        unparsed.report(&mut out, "launchctl list");
        let result = out.finish(&[]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].context, "launchctl list: unparsed output");
        assert!(result.errors[0].message.contains("2 line(s)"));
        assert!(result.errors[0].message.contains("???"));
    }

    #[test]
    fn test_nothing_unparsed_records_nothing() {
        let mut out = ScanBuilder::new("t", "T", "guardstick");
        Unparsed::new().report(&mut out, "x");
        assert!(out.finish(&[]).errors.is_empty());
    }
}
