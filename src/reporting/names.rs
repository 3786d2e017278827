use chrono::{DateTime, Local};
use crate::errors::GuardError;

pub const REPORT_EXTENSIONS: &[&str] = &["json", "txt"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `{scan_type}_Report_{YYYY-MM-DD_HH-MM-SS}.json`
pub fn report_filename(scan_type: &str, at: DateTime<Local>) -> String {
    format!("{}_Report_{}.json", scan_type, at.format(TIMESTAMP_FORMAT))
}

pub fn validate_scan_type(scan_type: &str) -> Result<(), GuardError> {
    if scan_type.is_empty()
        || !scan_type.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(GuardError::InvalidRequest(format!("Invalid scan type: {:?}", scan_type)));
    }
    Ok(())
}

/// Reject anything that is not a plain file name inside the reports
/// directory. Runs before any filesystem call.
pub fn validate_report_name(name: &str) -> Result<(), GuardError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.chars().any(char::is_control);
    if invalid {
        return Err(GuardError::InvalidRequest(format!("Invalid log file name: {:?}", name)));
    }
    Ok(())
}

pub fn has_report_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && REPORT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_filename_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            report_filename("Firewall_Security", at),
            "Firewall_Security_Report_2024-03-09_14-05-07.json"
        );
    }

    #[test]
    fn test_scan_type_validation() {
        assert!(validate_scan_type("SIP_Status").is_ok());
        assert!(validate_scan_type("").is_err());
        assert!(validate_scan_type("../SIP").is_err());
        assert!(validate_scan_type("SIP Status").is_err());
    }

    #[test]
    fn test_traversal_names_rejected() {
        for name in ["../../etc/passwd", "..", ".", "a/b.json", "a\\b.json", "", ".hidden.json", "x\0.json"] {
            assert!(
                matches!(validate_report_name(name), Err(GuardError::InvalidRequest(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_plain_names_accepted() {
        assert!(validate_report_name("SIP_Status_Report_2024-01-01_00-00-00.json").is_ok());
        assert!(validate_report_name("notes.txt").is_ok());
    }

    #[test]
    fn test_report_extension() {
        assert!(has_report_extension("a.json"));
        assert!(has_report_extension("a.txt"));
        assert!(!has_report_extension("a.log"));
        assert!(!has_report_extension("json"));
    }
}
