use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::models::{NetworkConnection, RecordCounter, ScanBuilder, ScanRecord};
use super::geo::{is_internal, INTERNAL_NETWORK, UNKNOWN_LOCATION};
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "network_connections",
    scan_type: "Network_Connections",
    display_name: "Network Connections",
    budget: TimeoutClass::Long,
};

const COUNTERS: &[RecordCounter] = &[
    ("internal", |r| matches!(r, ScanRecord::NetworkConnection(c) if c.internal)),
    ("external", |r| matches!(r, ScanRecord::NetworkConnection(c) if !c.internal)),
];

pub struct NetworkScanner;

#[async_trait]
impl Scanner for NetworkScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let output = match ctx.output(&["lsof", "-i", "-n", "-P"]).await {
            Ok(output) => output,
            Err(e) => {
                out.record_error("lsof", e);
                return;
            }
        };

        let (mut connections, unparsed) = parse_lsof(&output.stdout);
        unparsed.report(out, "lsof");

        let mut cache: HashMap<IpAddr, String> = HashMap::new();
        let mut failed_lookups = 0usize;
        for conn in &mut connections {
            let Ok(ip) = conn.remote_ip.parse::<IpAddr>() else {
                conn.location = UNKNOWN_LOCATION.to_string();
                continue;
            };
            if conn.internal {
                conn.location = INTERNAL_NETWORK.to_string();
                continue;
            }
            let Some(geo) = &ctx.geo else {
                continue;
            };
            if let Some(known) = cache.get(&ip) {
                conn.location = known.clone();
                continue;
            }
            let location = match geo.locate(ip).await {
                Ok(location) => location,
                Err(e) => {
                    debug!(ip = %ip, error = %e, "Geolocation lookup failed");
                    failed_lookups += 1;
                    UNKNOWN_LOCATION.to_string()
                }
            };
            cache.insert(ip, location.clone());
            conn.location = location;
        }
        if failed_lookups > 0 {
            out.record_error("geolocation", format!("{} lookup(s) failed; marked Unknown", failed_lookups));
        }

        out.extend(connections.into_iter().map(ScanRecord::NetworkConnection));
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// Split `host:port`, handling bracketed IPv6.
pub(crate) fn split_endpoint(endpoint: &str) -> Option<(String, Option<u16>)> {
    let (host, port) = endpoint.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()))
}

/// Established connections from `lsof -i -n -P`. The owning process comes
/// from the COMMAND and PID columns; lsof escapes spaces as `\x20`.
pub fn parse_lsof(text: &str) -> (Vec<NetworkConnection>, Unparsed) {
    let mut connections = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text) {
        if line.starts_with("COMMAND") || !line.contains("(ESTABLISHED)") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            unparsed.note(line);
            continue;
        }
        let Some((local, remote)) = fields[8].split_once("->") else {
            unparsed.note(line);
            continue;
        };
        let Some((remote_ip, remote_port)) = split_endpoint(remote) else {
            unparsed.note(line);
            continue;
        };
        let internal = remote_ip.parse::<IpAddr>().map(|ip| is_internal(&ip)).unwrap_or(false);
        let process = fields[0].replace("\\x20", " ");
        connections.push(NetworkConnection {
            process: (!process.is_empty()).then_some(process),
            pid: fields[1].parse().ok(),
            protocol: fields[7].to_string(),
            local_address: local.to_string(),
            remote_ip,
            remote_port,
            location: UNKNOWN_LOCATION.to_string(),
            internal,
        });
    }
    (connections, unparsed)
}
