use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::errors::GuardError;
use crate::models::{ReportFile, Summary};
use crate::reporting::ReportWriter;
use super::{run_scanner, ScanContext, ScanDefinition, Scanner};
use super::{browser, cryptojacking, entitlements, files, firewall, hashes, network, ports, privacy};
use super::{processes, ransomware, scheduled, services, sip, snapshots, startup, unsigned, updates};
use super::{users, vulnerable};

/// Outcome of a registry-driven scan: where the report went and what it
/// summarized.
#[derive(Debug, Clone, Serialize)]
pub struct ScanExecution {
    pub key: &'static str,
    pub report: ReportFile,
    pub summary: Summary,
    pub error_count: usize,
}

/// The fixed set of runnable scans. Lookups are by key only; nothing
/// path-like is ever resolved or executed.
pub struct ScanRegistry {
    scanners: Vec<Arc<dyn Scanner>>,
}

impl ScanRegistry {
    pub fn standard() -> Self {
        let scanners: Vec<Arc<dyn Scanner>> = vec![
            Arc::new(firewall::FirewallScanner),
            Arc::new(sip::SipScanner),
            Arc::new(privacy::PrivacyScanner),
            Arc::new(processes::ProcessScanner),
            Arc::new(network::NetworkScanner),
            Arc::new(browser::BrowserExtensionsScanner),
            Arc::new(startup::StartupItemsScanner),
            Arc::new(scheduled::ScheduledTasksScanner),
            Arc::new(vulnerable::VulnerableSoftwareScanner),
            Arc::new(ransomware::RansomwareScanner),
            Arc::new(hashes::ExecutableHashesScanner),
            Arc::new(files::LargeOldFilesScanner),
            Arc::new(services::ServicesScanner),
            Arc::new(unsigned::UnsignedAppsScanner),
            Arc::new(updates::UpdatesScanner),
            Arc::new(snapshots::SnapshotScanner),
            Arc::new(users::UserPermissionsScanner),
            Arc::new(entitlements::ApplicationSecurityScanner),
            Arc::new(ports::SuspiciousPortsScanner),
            Arc::new(cryptojacking::CryptojackingScanner::default()),
        ];
        Self { scanners }
    }

    pub fn with_scanners(scanners: Vec<Arc<dyn Scanner>>) -> Self {
        Self { scanners }
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn Scanner>, GuardError> {
        self.scanners
            .iter()
            .find(|s| s.definition().key == key)
            .cloned()
            .ok_or_else(|| GuardError::NotFound(format!("Unknown scan: {}", key)))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &'static ScanDefinition> + '_ {
        self.scanners.iter().map(|s| s.definition())
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.definitions().map(|d| d.key).collect()
    }

    /// Run the scan registered under `key` and persist its report.
    pub async fn execute(
        &self,
        key: &str,
        ctx: &ScanContext,
        writer: &ReportWriter,
    ) -> Result<ScanExecution, GuardError> {
        let scanner = self.get(key)?;
        let def = scanner.definition();
        let result = run_scanner(scanner.as_ref(), ctx).await;
        let report = writer.write(&result, def.scan_type).await?;
        info!(scan = def.key, report = %report.name, "Report written");
        Ok(ScanExecution {
            key: def.key,
            error_count: result.errors.len(),
            summary: result.summary,
            report,
        })
    }
}

impl Default for ScanRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
