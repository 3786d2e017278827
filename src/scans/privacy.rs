use std::time::Instant;

use async_trait::async_trait;

use crate::errors::GuardError;
use crate::models::{PrivacyGrant, RecordCounter, ScanBuilder, ScanRecord};
use super::parse::{lines, Unparsed};
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "privacy",
    scan_type: "Privacy_Settings",
    display_name: "Privacy Settings Check",
    budget: TimeoutClass::Long,
};

pub const SYSTEM_TCC_DB: &str = "/Library/Application Support/com.apple.TCC/TCC.db";
const USER_TCC_DB: &str = "Library/Application Support/com.apple.TCC/TCC.db";

/// TCC service identifier and the name shown in reports.
pub const SERVICES: &[(&str, &str)] = &[
    ("kTCCServiceCamera", "Camera"),
    ("kTCCServiceMicrophone", "Microphone"),
    ("kTCCServiceLocation", "Location"),
    ("kTCCServiceSystemPolicyAllFiles", "Full Disk Access"),
    ("kTCCServiceAccessibility", "Accessibility"),
    ("kTCCServiceScreenCapture", "Screen Recording"),
];

const COUNTERS: &[RecordCounter] = &[
    ("granted", |r| matches!(r, ScanRecord::PrivacyGrant(g) if g.allowed)),
    ("denied", |r| matches!(r, ScanRecord::PrivacyGrant(g) if !g.allowed)),
];

pub struct PrivacyScanner;

#[async_trait]
impl Scanner for PrivacyScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    /// The system database needs Full Disk Access; when it can't be read the
    /// user database is tried instead.
    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let user_db = display_path(&ctx.home(USER_TCC_DB));
        for (label, db) in [("system", SYSTEM_TCC_DB.to_string()), ("user", user_db)] {
            match query_tcc(ctx, &db).await {
                Ok((text, legacy)) => {
                    let (grants, unparsed) = parse_tcc_rows(&text, label, legacy);
                    out.extend(grants.into_iter().map(ScanRecord::PrivacyGrant));
                    unparsed.report(out, &format!("{} TCC database", label));
                    return;
                }
                Err(e) => out.record_error(format!("{} TCC database", label), e),
            }
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// Rows plus whether they came from the legacy `allowed` column.
async fn query_tcc(ctx: &ScanContext, db: &str) -> Result<(String, bool), GuardError> {
    let services = SERVICES
        .iter()
        .map(|(id, _)| format!("'{}'", id))
        .collect::<Vec<_>>()
        .join(",");
    // auth_value replaced `allowed` in newer schemas
    for column in ["auth_value", "allowed"] {
        let sql = format!(
            "SELECT service, client, {} FROM access WHERE service IN ({});",
            column, services
        );
        let output = ctx.output(&["sqlite3", "-separator", "|", db, &sql]).await?;
        if output.success() {
            return Ok((output.stdout, column == "allowed"));
        }
        if !output.stderr.contains("no such column") {
            return Err(GuardError::CommandExecutionFailed(format!(
                "sqlite3 exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
    }
    Err(GuardError::ParseAmbiguous("TCC schema has neither auth_value nor allowed".into()))
}

fn friendly_service(id: &str) -> String {
    SERVICES
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Rows are `service|client|value`. Current schemas grant with 2 (allowed)
/// or 3 (limited); the legacy `allowed` column grants with 1.
pub fn parse_tcc_rows(text: &str, database: &str, legacy: bool) -> (Vec<PrivacyGrant>, Unparsed) {
    let mut grants = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() != 3 {
            unparsed.note(line);
            continue;
        }
        let Ok(value) = parts[2].trim().parse::<i64>() else {
            unparsed.note(line);
            continue;
        };
        grants.push(PrivacyGrant {
            service: friendly_service(parts[0]),
            client: parts[1].to_string(),
            allowed: if legacy { value == 1 } else { value >= 2 },
            database: database.to_string(),
        });
    }
    (grants, unparsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scans::run_scanner;
    use crate::scans::testing::{context, ScriptedExecutor};

    #[test]
    fn test_parse_rows() {
        let text = "kTCCServiceCamera|us.zoom.xos|2\nkTCCServiceMicrophone|com.apple.Terminal|0\nbad row\n";
        let (grants, unparsed) = parse_tcc_rows(text, "user", false);
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].service, "Camera");
        assert!(grants[0].allowed);
        assert!(!grants[1].allowed);
        assert_eq!(grants[1].database, "user");
        assert_eq!(unparsed.count(), 1);
    }

    #[test]
    fn test_parse_legacy_rows() {
        let (grants, _) = parse_tcc_rows("kTCCServiceAccessibility|com.example.helper|1\n", "system", true);
        assert!(grants[0].allowed);
        assert_eq!(grants[0].service, "Accessibility");
    }

    #[tokio::test]
    async fn test_falls_back_to_user_database() {
        // System db unscripted, so it fails like a missing permission
        let ctx = context(ScriptedExecutor::new());
        let user_db = display_path(&ctx.home(USER_TCC_DB));
        let services = SERVICES.iter().map(|(id, _)| format!("'{}'", id)).collect::<Vec<_>>().join(",");
        let sql = format!("SELECT service, client, auth_value FROM access WHERE service IN ({});", services);
        let executor = ScriptedExecutor::new().stdout(
            &format!("sqlite3 -separator | {} {}", user_db, sql),
            "kTCCServiceScreenCapture|com.obsproject.obs-studio|2\n",
        );
        let ctx = context(executor);

        let result = run_scanner(&PrivacyScanner, &ctx).await;
        assert_eq!(result.summary.total, 1);
        assert_eq!(result.summary.counts["granted"], 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].context, "system TCC database");
    }
}
