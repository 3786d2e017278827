//! Scan modules. Each one inspects a single security-relevant aspect of the
//! host and normalizes what it finds into a [`ScanResult`].
//!
//! Sub-check failures are recorded on the builder and never abort the rest
//! of the scan. Every command gets its family timeout, shortened to whatever
//! is left of the module budget, so a slow command fails on its own and the
//! later sub-checks still run. The module-level cut-off is a last resort.

pub mod browser;
pub mod cryptojacking;
pub mod entitlements;
pub mod files;
pub mod firewall;
pub mod geo;
pub mod hashes;
pub mod network;
pub mod parse;
pub mod ports;
pub mod privacy;
pub mod processes;
pub mod ransomware;
pub mod registry;
pub mod scheduled;
pub mod services;
pub mod sip;
pub mod snapshots;
pub mod startup;
pub mod unsigned;
pub mod updates;
pub mod users;
pub mod vulnerable;
pub mod walk;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::errors::GuardError;
use crate::models::{RecordCounter, ScanBuilder, ScanResult};
use crate::runner::{CommandExecutor, CommandInvocation, CommandOutput};
use geo::GeoLocator;

pub use registry::{ScanExecution, ScanRegistry};

pub const TOOL_NAME: &str = "guardstick";

/// Slack past the deadline before a module is cancelled outright.
const BUDGET_GRACE: Duration = Duration::from_secs(5);

/// Timeout family. Quick covers single status probes, Long covers
/// filesystem walks and per-application loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Quick,
    Long,
}

/// Static description of a scan module.
#[derive(Debug)]
pub struct ScanDefinition {
    /// Registry key accepted by `POST /api/execute` and `guardstick scan`.
    pub key: &'static str,
    /// Report filename prefix.
    pub scan_type: &'static str,
    pub display_name: &'static str,
    pub budget: TimeoutClass,
}

/// Everything a scan module may touch: the command executor, thresholds,
/// and a few well-known paths.
#[derive(Clone)]
pub struct ScanContext {
    runner: Arc<dyn CommandExecutor>,
    pub settings: ScanConfig,
    pub home_dir: PathBuf,
    pub exploit_db: PathBuf,
    pub geo: Option<GeoLocator>,
    deadline: Option<Instant>,
}

impl ScanContext {
    pub fn new(runner: Arc<dyn CommandExecutor>, settings: ScanConfig, exploit_db: PathBuf) -> Self {
        let home_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));
        let geo = if settings.geolocation {
            match GeoLocator::new(&settings.geolocation_url, Duration::from_secs(5)) {
                Ok(geo) => Some(geo),
                Err(e) => {
                    warn!(error = %e, "Geolocation disabled");
                    None
                }
            }
        } else {
            None
        };
        Self { runner, settings, home_dir, exploit_db, geo, deadline: None }
    }

    pub fn with_home(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = home_dir.into();
        self
    }

    pub fn without_geolocation(mut self) -> Self {
        self.geo = None;
        self
    }

    /// Same context, with commands bounded by `deadline`.
    pub fn until(&self, deadline: Instant) -> Self {
        Self { deadline: Some(deadline), ..self.clone() }
    }

    /// Per-command timeout of a family.
    pub fn timeout(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Quick => Duration::from_secs(self.settings.quick_timeout_secs),
            TimeoutClass::Long => Duration::from_secs(self.settings.long_timeout_secs),
        }
    }

    /// Whole-module budget of a family.
    pub fn budget(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Quick => Duration::from_secs(self.settings.quick_budget_secs),
            TimeoutClass::Long => Duration::from_secs(self.settings.long_budget_secs),
        }
    }

    /// Family timeout, cut short by the module deadline when one is set.
    pub fn command_timeout(&self, class: TimeoutClass) -> Duration {
        let family = self.timeout(class);
        match self.deadline {
            Some(deadline) => family.min(deadline.saturating_duration_since(Instant::now())),
            None => family,
        }
    }

    pub async fn run(&self, args: &[&str], class: TimeoutClass) -> CommandInvocation {
        self.runner.run_args(args, self.command_timeout(class)).await
    }

    /// Quick-timeout command collapsed to a result.
    pub async fn output(&self, args: &[&str]) -> Result<CommandOutput, GuardError> {
        self.run(args, TimeoutClass::Quick).await.into_output()
    }

    pub fn home(&self, relative: &str) -> PathBuf {
        self.home_dir.join(relative)
    }

    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::clone(&self.runner)
    }
}

#[async_trait]
pub trait Scanner: Send + Sync {
    fn definition(&self) -> &'static ScanDefinition;

    /// Run every sub-check, pushing records and errors into `out`.
    /// `deadline` is when the module's budget runs out; blocking work
    /// should stop on its own by then.
    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, deadline: Instant);

    /// Named subsets of the records reported in the summary.
    fn counters(&self) -> &'static [RecordCounter] {
        &[]
    }
}

/// Drive one scanner to a finished result within its time budget.
pub async fn run_scanner(scanner: &dyn Scanner, ctx: &ScanContext) -> ScanResult {
    let def = scanner.definition();
    let budget = ctx.budget(def.budget);
    let mut out = ScanBuilder::new(def.display_name, def.scan_type, TOOL_NAME);
    info!(scan = def.key, budget_secs = budget.as_secs(), "Scan started");

    let deadline = Instant::now() + budget;
    let scoped = ctx.until(deadline);
    let collected =
        tokio::time::timeout(budget + BUDGET_GRACE, scanner.collect(&scoped, &mut out, deadline)).await;
    if collected.is_err() {
        out.record_error(
            "scan",
            GuardError::CommandTimedOut(format!("{} exceeded its {}s budget", def.key, budget.as_secs())),
        );
    }

    let result = out.finish(scanner.counters());
    info!(
        scan = def.key,
        records = result.summary.total,
        errors = result.errors.len(),
        "Scan finished"
    );
    result
}

pub(crate) fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
