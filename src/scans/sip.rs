use std::time::Instant;

use async_trait::async_trait;

use crate::models::{ScanBuilder, ScanRecord, SipStatus, ToggleStatus};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "sip",
    scan_type: "SIP_Status",
    display_name: "System Integrity Protection Status",
    budget: TimeoutClass::Quick,
};

pub struct SipScanner;

#[async_trait]
impl Scanner for SipScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let status = match ctx.output(&["csrutil", "status"]).await {
            Ok(output) => {
                let (status, custom) = parse_csrutil(&output.stdout);
                if custom {
                    out.note("configuration", "custom");
                }
                out.push(ScanRecord::SipStatus(SipStatus {
                    status,
                    detail: output.stdout.trim().to_string(),
                }));
                status
            }
            Err(e) => {
                out.record_error("csrutil status", &e);
                out.push(ScanRecord::SipStatus(SipStatus {
                    status: ToggleStatus::Error,
                    detail: e.to_string(),
                }));
                ToggleStatus::Error
            }
        };
        out.set_overall_status(status.as_str());
    }
}

/// Status line plus whether a custom (partially disabled) configuration is
/// listed below it.
pub fn parse_csrutil(text: &str) -> (ToggleStatus, bool) {
    let first = text
        .lines()
        .find(|l| l.to_lowercase().contains("system integrity protection status"))
        .unwrap_or("");
    let custom = text.to_lowercase().contains("custom configuration");
    (ToggleStatus::from_text(first), custom)
}
