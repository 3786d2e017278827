use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{ListeningPort, RecordCounter, ScanBuilder, ScanRecord};
use super::network::split_endpoint;
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "suspicious_ports",
    scan_type: "Suspicious_Ports",
    display_name: "Suspicious Ports",
    budget: TimeoutClass::Quick,
};

const COUNTERS: &[RecordCounter] = &[
    ("exposed", |r| matches!(r, ScanRecord::ListeningPort(p) if p.exposed)),
    ("suspicious", |r| matches!(r, ScanRecord::ListeningPort(p) if p.suspicious)),
];

/// Ports long associated with backdoors, botnet control or miners.
pub const SUSPICIOUS_PORTS: &[(u16, &str)] = &[
    (1337, "common backdoor port"),
    (3333, "Stratum mining pool port"),
    (4444, "Metasploit default listener"),
    (5555, "common remote-shell port"),
    (6666, "IRC botnet control"),
    (6667, "IRC botnet control"),
    (9050, "Tor SOCKS proxy"),
    (12345, "NetBus trojan"),
    (27374, "SubSeven trojan"),
    (31337, "Back Orifice backdoor"),
];

pub struct SuspiciousPortsScanner;

#[async_trait]
impl Scanner for SuspiciousPortsScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        // lsof exits 1 when nothing matches, so the exit code is ignored.
        match ctx.output(&["lsof", "-iTCP", "-sTCP:LISTEN", "-n", "-P"]).await {
            Ok(output) => {
                let (ports, unparsed) = parse_listening(&output.stdout);
                unparsed.report(out, "lsof listen");
                out.extend(ports.into_iter().map(ScanRecord::ListeningPort));
            }
            Err(e) => out.record_error("lsof listen", e),
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

fn is_loopback(host: &str) -> bool {
    host == "localhost" || host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

pub fn suspicious_reason(port: u16) -> Option<&'static str> {
    SUSPICIOUS_PORTS.iter().find(|(p, _)| *p == port).map(|(_, reason)| *reason)
}

/// LISTEN sockets from `lsof -iTCP -sTCP:LISTEN -n -P`, one record per
/// process, address and port.
pub fn parse_listening(text: &str) -> (Vec<ListeningPort>, Unparsed) {
    let mut ports = Vec::new();
    let mut seen = HashSet::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        if line.starts_with("COMMAND") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !line.ends_with("(LISTEN)") {
            unparsed.note(line);
            continue;
        }
        let Some((address, Some(port))) = split_endpoint(fields[8]) else {
            unparsed.note(line);
            continue;
        };
        let pid = fields[1].parse().ok();
        if !seen.insert((pid, address.clone(), port)) {
            continue;
        }
        let reason = suspicious_reason(port);
        ports.push(ListeningPort {
            process: fields[0].replace("\\x20", " "),
            pid,
            user: fields[2].to_string(),
            exposed: !is_loopback(&address),
            address,
            port,
            suspicious: reason.is_some(),
            reason: reason.map(str::to_string),
        });
    }
    (ports, unparsed)
}
