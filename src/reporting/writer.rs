use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::errors::GuardError;
use crate::models::{ReportFile, ScanResult};
use super::names::{report_filename, validate_scan_type};

/// Persists scan results as timestamped, never-overwritten JSON files.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    reports_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self { reports_dir: reports_dir.into() }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub async fn write(&self, result: &ScanResult, scan_type: &str) -> Result<ReportFile, GuardError> {
        self.write_at(result, scan_type, Local::now()).await
    }

    /// The file is staged under a hidden temporary name and then hard-linked
    /// into place. Linking fails if the target exists, so an existing report
    /// is never replaced and readers never see a partial file.
    pub async fn write_at(
        &self,
        result: &ScanResult,
        scan_type: &str,
        at: DateTime<Local>,
    ) -> Result<ReportFile, GuardError> {
        validate_scan_type(scan_type)?;
        let name = report_filename(scan_type, at);
        let final_path = self.reports_dir.join(&name);

        tokio::fs::create_dir_all(&self.reports_dir).await?;

        let body = serde_json::to_vec_pretty(result)?;
        let tmp_path = self
            .reports_dir
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

        let staged = stage(&tmp_path, &body).await;
        if let Err(e) = staged {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        let linked = tokio::fs::hard_link(&tmp_path, &final_path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            warn!(path = %tmp_path.display(), error = %e, "Failed to remove staging file");
        }

        match linked {
            Ok(()) => {
                info!(report = %name, records = result.summary.total, errors = result.errors.len(), "Report written");
                Ok(ReportFile {
                    name,
                    path: final_path,
                    size_bytes: body.len() as u64,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(report = %name, "Report name collision");
                Err(GuardError::ReportCollision(name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn stage(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::ScanBuilder;

    fn sample() -> ScanResult {
        let mut builder = ScanBuilder::new("SIP Status", "SIP_Status", "guardstick");
        builder.set_overall_status("Enabled");
        builder.finish(&[])
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("nested").join("reports"));
        let report = writer.write(&sample(), "SIP_Status").await.unwrap();
        assert!(report.path.exists());
        assert!(report.name.starts_with("SIP_Status_Report_"));
        assert!(report.name.ends_with(".json"));
    }

    #[tokio::test]
    async fn test_collision_is_surfaced_and_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let first = writer.write_at(&sample(), "SIP_Status", at).await.unwrap();
        let original = std::fs::read(&first.path).unwrap();

        let err = writer.write_at(&sample(), "SIP_Status", at).await.unwrap_err();
        assert!(matches!(err, GuardError::ReportCollision(_)));
        assert_eq!(std::fs::read(&first.path).unwrap(), original);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![first.name]);
    }

    #[tokio::test]
    async fn test_rejects_bad_scan_type() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let err = writer.write(&sample(), "../escape").await.unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_written_json_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let report = writer.write(&sample(), "SIP_Status").await.unwrap();
        let parsed: ScanResult = serde_json::from_slice(&std::fs::read(&report.path).unwrap()).unwrap();
        assert_eq!(parsed.summary.overall_status.as_deref(), Some("Enabled"));
        assert_eq!(parsed.metadata.scan_type, "SIP_Status");
    }
}
