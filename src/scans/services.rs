use std::time::Instant;

use async_trait::async_trait;

use crate::models::{RecordCounter, ScanBuilder, ScanRecord, ServiceCategory, ServiceEntry};
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "active_services",
    scan_type: "Active_Services",
    display_name: "Active Services",
    budget: TimeoutClass::Quick,
};

const COUNTERS: &[RecordCounter] = &[
    ("system", |r| matches!(r, ScanRecord::Service(s) if s.category == ServiceCategory::System)),
    ("user_defined", |r| matches!(r, ScanRecord::Service(s) if s.category == ServiceCategory::UserDefined)),
    ("running", |r| matches!(r, ScanRecord::Service(s) if s.pid.is_some())),
];

pub struct ServicesScanner;

#[async_trait]
impl Scanner for ServicesScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        match ctx.output(&["launchctl", "list"]).await {
            Ok(output) => {
                let (services, unparsed) = parse_launchctl_list(&output.stdout);
                out.extend(services.into_iter().map(ScanRecord::Service));
                unparsed.report(out, "launchctl list");
            }
            Err(e) => out.record_error("launchctl list", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// `PID Status Label`, tab separated; `-` for a missing pid.
pub fn parse_launchctl_list(text: &str) -> (Vec<ServiceEntry>, Unparsed) {
    let mut services = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        if line.starts_with("PID") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            unparsed.note(line);
            continue;
        }
        let pid = match fields[0] {
            "-" => None,
            raw => match raw.parse() {
                Ok(pid) => Some(pid),
                Err(_) => {
                    unparsed.note(line);
                    continue;
                }
            },
        };
        let label = fields[2].to_string();
        services.push(ServiceEntry {
            pid,
            last_exit_status: fields[1].parse().ok(),
            category: if label.starts_with("com.apple") {
                ServiceCategory::System
            } else {
                ServiceCategory::UserDefined
            },
            label,
        });
    }
    (services, unparsed)
}
