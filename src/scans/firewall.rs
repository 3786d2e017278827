use std::sync::LazyLock;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;

use crate::models::{FirewallCheck, FirewallRule, RecordCounter, RuleAction, ScanBuilder, ScanRecord, ToggleStatus};
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "firewall",
    scan_type: "Firewall_Security",
    display_name: "Firewall Security Check",
    budget: TimeoutClass::Quick,
};

/// (record name, socketfilterfw flag). The first entry drives overall status.
const CHECKS: &[(&str, &str)] = &[
    ("global_state", "--getglobalstate"),
    ("logging_mode", "--getloggingmode"),
    ("stealth_mode", "--getstealthmode"),
];

static APP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*:\s*(.+?)\s*$").expect("valid regex"));

const COUNTERS: &[RecordCounter] = &[
    ("rules", |r| matches!(r, ScanRecord::FirewallRule(_))),
    ("allowed_rules", |r| matches!(r, ScanRecord::FirewallRule(rule) if rule.action == RuleAction::Allow)),
    ("blocked_rules", |r| matches!(r, ScanRecord::FirewallRule(rule) if rule.action == RuleAction::Block)),
];

pub struct FirewallScanner;

#[async_trait]
impl Scanner for FirewallScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let mut global = ToggleStatus::Error;

        for (index, (check, flag)) in CHECKS.iter().enumerate() {
            let status = match ctx.output(&[SOCKETFILTERFW, *flag]).await {
                Ok(output) => {
                    let text = format!("{}{}", output.stdout, output.stderr);
                    let status = ToggleStatus::from_text(&text);
                    out.push(ScanRecord::FirewallCheck(FirewallCheck {
                        check: check.to_string(),
                        status,
                        detail: text.trim().to_string(),
                    }));
                    status
                }
                Err(e) => {
                    out.record_error(*check, &e);
                    out.push(ScanRecord::FirewallCheck(FirewallCheck {
                        check: check.to_string(),
                        status: ToggleStatus::Error,
                        detail: e.to_string(),
                    }));
                    ToggleStatus::Error
                }
            };
            if index == 0 {
                global = status;
            }
        }
        out.set_overall_status(global.as_str());

        match ctx.output(&[SOCKETFILTERFW, "--listapps"]).await {
            Ok(output) => {
                let (rules, unparsed) = parse_app_rules(&output.stdout);
                out.extend(rules.into_iter().map(ScanRecord::FirewallRule));
                unparsed.report(out, "application_rules");
            }
            Err(e) => out.record_error("application_rules", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// Parse `socketfilterfw --listapps`: a numbered application path followed
/// by an "( Allow/Block incoming connections )" line.
pub fn parse_app_rules(text: &str) -> (Vec<FirewallRule>, Unparsed) {
    let mut rules: Vec<FirewallRule> = Vec::new();
    let mut unparsed = Unparsed::new();

    for line in lines(text) {
        let lower = line.to_lowercase();
        if lower.contains("total number of apps") {
            continue;
        }
        if let Some(caps) = APP_LINE.captures(line) {
            rules.push(FirewallRule {
                application: caps[1].to_string(),
                action: RuleAction::Unknown,
            });
            continue;
        }
        let action = if lower.contains("allow incoming") {
            Some(RuleAction::Allow)
        } else if lower.contains("block incoming") {
            Some(RuleAction::Block)
        } else {
            None
        };
        match (action, rules.last_mut()) {
            (Some(action), Some(rule)) if rule.action == RuleAction::Unknown => rule.action = action,
            _ => unparsed.note(line),
        }
    }
    (rules, unparsed)
}
