use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ToggleStatus;
use crate::runner::{CommandExecutor, CommandOutput};

const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthIndicators {
    pub sip_status: ToggleStatus,
    pub firewall_status: ToggleStatus,
    pub filevault_status: ToggleStatus,
    pub gatekeeper_status: ToggleStatus,
    pub app_quarantine_status: ToggleStatus,
    pub active_network_interfaces: String,
    pub battery_health: String,
    pub threat_level: ThreatLevel,
}

/// High when SIP or the firewall is off, Medium when disk encryption or
/// Gatekeeper is off.
pub fn threat_level(
    sip: ToggleStatus,
    firewall: ToggleStatus,
    filevault: ToggleStatus,
    gatekeeper: ToggleStatus,
) -> ThreatLevel {
    if sip == ToggleStatus::Disabled || firewall == ToggleStatus::Disabled {
        ThreatLevel::High
    } else if filevault == ToggleStatus::Disabled || gatekeeper == ToggleStatus::Disabled {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

async fn probe(executor: &dyn CommandExecutor, args: &[&str], timeout: Duration) -> Option<CommandOutput> {
    executor.run_args(args, timeout).await.into_output().ok()
}

fn toggle(output: Option<CommandOutput>) -> ToggleStatus {
    match output {
        Some(out) if out.success() => ToggleStatus::from_text(&out.stdout),
        Some(_) => ToggleStatus::Unknown,
        None => ToggleStatus::Error,
    }
}

pub fn quarantine_status(value: &str) -> ToggleStatus {
    match value.trim() {
        "1" => ToggleStatus::Enabled,
        "0" => ToggleStatus::Disabled,
        _ => ToggleStatus::Unknown,
    }
}

/// Interfaces whose `ifconfig` block reports `status: active`.
pub fn active_interfaces(text: &str) -> String {
    let mut current: Option<&str> = None;
    let mut active = Vec::new();
    for line in text.lines() {
        if !line.starts_with(char::is_whitespace) {
            current = line.split(':').next().filter(|s| !s.is_empty());
        } else if line.trim() == "status: active" {
            if let Some(name) = current {
                active.push(name);
            }
        }
    }
    if active.is_empty() {
        "None".to_string()
    } else {
        active.join(", ")
    }
}

/// Charge and state from `pmset -g batt`, e.g. "85%; charging".
pub fn battery_health(text: &str) -> String {
    let Some(line) = text.lines().find(|l| l.contains("InternalBattery")) else {
        return "No Battery".to_string();
    };
    let details = line.split_once('\t').map(|(_, rest)| rest).unwrap_or(line);
    details
        .split(';')
        .take(2)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run every probe concurrently; a failing probe yields `Error` for its
/// own field only.
pub async fn collect_indicators(executor: &dyn CommandExecutor, timeout: Duration) -> HealthIndicators {
    let (sip, firewall, filevault, gatekeeper, quarantine, ifconfig, battery) = tokio::join!(
        probe(executor, &["csrutil", "status"], timeout),
        probe(executor, &[SOCKETFILTERFW, "--getglobalstate"], timeout),
        probe(executor, &["fdesetup", "status"], timeout),
        probe(executor, &["spctl", "--status"], timeout),
        probe(executor, &["defaults", "read", "com.apple.LaunchServices", "LSQuarantine"], timeout),
        probe(executor, &["ifconfig"], timeout),
        probe(executor, &["pmset", "-g", "batt"], timeout),
    );

    let sip_status = toggle(sip);
    let firewall_status = toggle(firewall);
    let filevault_status = toggle(filevault);
    // spctl --status exits 1 when assessments are disabled.
    let gatekeeper_status = match gatekeeper {
        Some(out) => ToggleStatus::from_text(&format!("{}{}", out.stdout, out.stderr)),
        None => ToggleStatus::Error,
    };
    let app_quarantine_status = match quarantine {
        Some(out) => quarantine_status(&out.stdout),
        None => ToggleStatus::Error,
    };
    let active_network_interfaces = match ifconfig {
        Some(out) if out.success() => active_interfaces(&out.stdout),
        _ => "Error".to_string(),
    };
    let battery_health = match battery {
        Some(out) if out.success() => self::battery_health(&out.stdout),
        _ => "Error".to_string(),
    };

    HealthIndicators {
        threat_level: threat_level(sip_status, firewall_status, filevault_status, gatekeeper_status),
        sip_status,
        firewall_status,
        filevault_status,
        gatekeeper_status,
        app_quarantine_status,
        active_network_interfaces,
        battery_health,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scans::testing::ScriptedExecutor;

    const IFCONFIG: &str = "lo0: flags=8049<UP,LOOPBACK,RUNNING,MULTICAST> mtu 16384
\tinet 127.0.0.1 netmask 0xff000000
en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tether aa:bb:cc:dd:ee:ff
\tstatus: active
en1: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tstatus: inactive
utun3: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1380
\tstatus: active
";

    #[test]
    fn test_active_interfaces() {
        assert_eq!(active_interfaces(IFCONFIG), "en0, utun3");
        assert_eq!(active_interfaces("lo0: flags=1\n"), "None");
    }

    #[test]
    fn test_battery_health() {
        let text = "Now drawing from 'Battery Power'\n -InternalBattery-0 (id=1234)\t85%; discharging; 4:12 remaining present: true\n";
        assert_eq!(battery_health(text), "85%; discharging");
        assert_eq!(battery_health("Now drawing from 'AC Power'\n"), "No Battery");
    }

    #[test]
    fn test_threat_level() {
        use ToggleStatus::*;
        assert_eq!(threat_level(Enabled, Disabled, Enabled, Enabled), ThreatLevel::High);
        assert_eq!(threat_level(Enabled, Enabled, Disabled, Enabled), ThreatLevel::Medium);
        assert_eq!(threat_level(Enabled, Enabled, Enabled, Unknown), ThreatLevel::Low);
    }

    #[tokio::test]
    async fn test_collect_with_partial_failures() {
        let executor = ScriptedExecutor::new()
            .stdout("csrutil status", "System Integrity Protection status: enabled.\n")
            .stdout(&format!("{} --getglobalstate", SOCKETFILTERFW), "Firewall is disabled. (State = 0)\n")
            .stdout("fdesetup status", "FileVault is On.\n")
            .output("spctl --status", "assessments enabled\n", "", 0)
            .stdout("ifconfig", IFCONFIG);
        let indicators = collect_indicators(&executor, Duration::from_secs(5)).await;
        assert_eq!(indicators.sip_status, ToggleStatus::Enabled);
        assert_eq!(indicators.firewall_status, ToggleStatus::Disabled);
        assert_eq!(indicators.filevault_status, ToggleStatus::Enabled);
        assert_eq!(indicators.gatekeeper_status, ToggleStatus::Enabled);
        assert_eq!(indicators.app_quarantine_status, ToggleStatus::Error);
        assert_eq!(indicators.battery_health, "Error");
        assert_eq!(indicators.active_network_interfaces, "en0, utun3");
        assert_eq!(indicators.threat_level, ThreatLevel::High);
    }
}
