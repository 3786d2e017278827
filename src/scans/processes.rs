use std::time::Instant;

use async_trait::async_trait;

use crate::models::{ProcessInfo, ScanBuilder, ScanRecord};
use crate::utils::truncation::shorten;
use super::parse::{lines, Unparsed};
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "processes",
    scan_type: "Running_Processes",
    display_name: "Running Processes",
    budget: TimeoutClass::Quick,
};

/// Applications worth surfacing: browsers, editors and communication tools.
pub const RELEVANT_KEYWORDS: &[&str] = &[
    "chrome", "safari", "firefox", "brave", "spotify", "code", "mail", "slack", "zoom", "teams",
];

const COMMAND_WIDTH: usize = 35;

pub struct ProcessScanner;

#[async_trait]
impl Scanner for ProcessScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        match ctx.output(&["ps", "aux"]).await {
            Ok(output) => {
                let (processes, unparsed) = parse_ps_aux(&output.stdout);
                out.extend(
                    processes
                        .into_iter()
                        .filter(|p| is_relevant(&p.command))
                        .map(|mut p| {
                            p.command = shorten(&p.command, COMMAND_WIDTH);
                            ScanRecord::Process(p)
                        }),
                );
                unparsed.report(out, "ps aux");
            }
            Err(e) => out.record_error("ps aux", e),
        }
    }
}

pub fn is_relevant(command: &str) -> bool {
    let lower = command.to_lowercase();
    RELEVANT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// `USER PID %CPU %MEM VSZ RSS TT STAT STARTED TIME COMMAND...`
pub fn parse_ps_aux(text: &str) -> (Vec<ProcessInfo>, Unparsed) {
    let mut processes = Vec::new();
    let mut unparsed = Unparsed::new();
    for line in lines(text).skip_while(|l| l.starts_with("USER")) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 11 {
            unparsed.note(line);
            continue;
        }
        let (Ok(pid), Ok(cpu), Ok(mem)) = (
            fields[1].parse::<u32>(),
            fields[2].parse::<f32>(),
            fields[3].parse::<f32>(),
        ) else {
            unparsed.note(line);
            continue;
        };
        processes.push(ProcessInfo {
            user: fields[0].to_string(),
            pid,
            cpu_percent: cpu,
            mem_percent: mem,
            command: fields[10..].join(" "),
        });
    }
    (processes, unparsed)
}
