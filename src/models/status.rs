use serde::{Deserialize, Serialize};

/// Fixed vocabulary for on/off style checks.
///
/// `Unknown` means the command ran but its output matched no recognized
/// pattern; `Error` means the command could not be run or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToggleStatus {
    Enabled,
    Disabled,
    Unknown,
    Error,
}

impl ToggleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
            Self::Unknown => "Unknown",
            Self::Error => "Error",
        }
    }

    /// Map free text to a status by looking for "enabled"/"disabled" style
    /// words, checking the negative form first so "disabled" never reads as
    /// "enabled".
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("disabled") || lower.contains(" is off") || lower.contains("state = 0") {
            Self::Disabled
        } else if lower.contains("enabled") || lower.contains(" is on")
            || lower.contains("state = 1")
            || lower.contains("state = 2")
        {
            Self::Enabled
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for ToggleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
