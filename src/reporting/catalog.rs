use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::errors::GuardError;
use crate::models::{DeleteOutcome, ReportEntry};
use crate::utils::formatting::format_size;
use super::names::{has_report_extension, validate_report_name};

pub const DOWNLOAD_PREFIX: &str = "/api/logs/download/";

/// Read and delete access to the reports directory. Holds no locks: a
/// listing is a snapshot and may or may not include a report written
/// concurrently.
#[derive(Debug, Clone)]
pub struct ReportCatalog {
    reports_dir: PathBuf,
}

impl ReportCatalog {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self { reports_dir: reports_dir.into() }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Newest first; ties broken by name.
    pub async fn list(&self) -> Result<Vec<ReportEntry>, GuardError> {
        let mut dir = match tokio::fs::read_dir(&self.reports_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows: Vec<(SystemTime, ReportEntry)> = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !has_report_extension(&name) {
                continue;
            }
            // Entry may vanish between readdir and stat
            let Ok(meta) = tokio::fs::symlink_metadata(entry.path()).await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            rows.push((
                modified,
                ReportEntry {
                    size: format_size(meta.len()),
                    size_bytes: meta.len(),
                    timestamp: DateTime::<Local>::from(modified).to_rfc3339(),
                    download_url: format!("{}{}", DOWNLOAD_PREFIX, name),
                    name,
                },
            ));
        }

        rows.sort_by(|(ta, a), (tb, b)| tb.cmp(ta).then_with(|| a.name.cmp(&b.name)));
        Ok(rows.into_iter().map(|(_, entry)| entry).collect())
    }

    pub async fn download(&self, name: &str) -> Result<Vec<u8>, GuardError> {
        let path = self.resolve_existing(name).await?.ok_or_else(|| {
            GuardError::NotFound(format!("Log file not found: {}", name))
        })?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Raw bytes for the query service; identical rules to `download`.
    pub async fn read_raw(&self, name: &str) -> Result<Vec<u8>, GuardError> {
        self.download(name).await
    }

    /// All names are validated before anything is removed. Names that do not
    /// exist are reported back rather than failing the request.
    pub async fn delete(&self, names: &[String]) -> Result<DeleteOutcome, GuardError> {
        if names.is_empty() {
            return Err(GuardError::InvalidRequest("No logs specified for deletion".into()));
        }
        for name in names {
            validate_report_name(name)?;
        }

        let mut seen = HashSet::new();
        let mut outcome = DeleteOutcome::default();
        for name in names.iter().filter(|n| seen.insert(n.as_str())) {
            let Some(path) = self.resolve_existing(name).await? else {
                outcome.not_found.push(name.clone());
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(report = %name, "Report deleted");
                    outcome.deleted.push(name.clone());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    outcome.not_found.push(name.clone());
                }
                Err(e) => return Err(e.into()),
            }
        }

        if outcome.deleted.is_empty() {
            return Err(GuardError::NotFound("No valid logs found for deletion".into()));
        }
        Ok(outcome)
    }

    /// Path of an existing regular report file. Symlinks and other file
    /// types are treated as absent.
    async fn resolve_existing(&self, name: &str) -> Result<Option<PathBuf>, GuardError> {
        validate_report_name(name)?;
        if !has_report_extension(name) {
            return Ok(None);
        }
        let path = self.reports_dir.join(name);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => {
                debug!(report = %name, "Ignoring non-regular report entry");
                Ok(None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ReportCatalog) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let catalog = ReportCatalog::new(dir.path());
        (dir, catalog)
    }

    #[tokio::test]
    async fn test_list_filters_extensions_and_hidden() {
        let (_dir, catalog) = catalog_with(&[
            ("a.json", "{}"),
            ("b.txt", "text"),
            ("c.log", "ignored"),
            (".a.json.tmp", "staging"),
        ]);
        let names: Vec<String> = catalog.list().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a.json".to_string()));
        assert!(names.contains(&"b.txt".to_string()));
    }

    #[tokio::test]
    async fn test_list_entry_fields() {
        let (_dir, catalog) = catalog_with(&[("x.json", "{\"k\": 1}")]);
        let entries = catalog.list().await.unwrap();
        assert_eq!(entries[0].size_bytes, 8);
        assert_eq!(entries[0].size, "8 bytes");
        assert_eq!(entries[0].download_url, "/api/logs/download/x.json");
        assert!(DateTime::parse_from_rfc3339(&entries[0].timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let catalog = ReportCatalog::new("/nonexistent/guardstick/reports");
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_idempotent() {
        let (_dir, catalog) = catalog_with(&[("a.json", "{}"), ("b.json", "{}"), ("c.txt", "")]);
        let first = catalog.list().await.unwrap();
        let second = catalog.list().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_download_rejects_traversal() {
        let (_dir, catalog) = catalog_with(&[("a.json", "{}")]);
        let err = catalog.download("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let (_dir, catalog) = catalog_with(&[]);
        let err = catalog.download("missing.json").await.unwrap_err();
        assert!(matches!(err, GuardError::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_ignores_symlinks() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.json"), "secret").unwrap();
        let (dir, catalog) = catalog_with(&[]);
        std::os::unix::fs::symlink(outside.path().join("secret.json"), dir.path().join("link.json")).unwrap();
        let err = catalog.download("link.json").await.unwrap_err();
        assert!(matches!(err, GuardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_reports_missing_names() {
        let (dir, catalog) = catalog_with(&[("x.json", "{}")]);
        let outcome = catalog
            .delete(&["x.json".to_string(), "does-not-exist.json".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.deleted, vec!["x.json"]);
        assert_eq!(outcome.not_found, vec!["does-not-exist.json"]);
        assert!(!dir.path().join("x.json").exists());
    }

    #[tokio::test]
    async fn test_delete_collapses_duplicates() {
        let (_dir, catalog) = catalog_with(&[("x.json", "{}")]);
        let outcome = catalog.delete(&["x.json".to_string(), "x.json".to_string()]).await.unwrap();
        assert_eq!(outcome.deleted, vec!["x.json"]);
        assert!(outcome.not_found.is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_traversal_removes_nothing() {
        let (dir, catalog) = catalog_with(&[("x.json", "{}")]);
        let err = catalog
            .delete(&["x.json".to_string(), "../../etc/passwd".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest(_)));
        assert!(dir.path().join("x.json").exists());
    }

    #[tokio::test]
    async fn test_delete_empty_and_nothing_deleted() {
        let (_dir, catalog) = catalog_with(&[]);
        assert!(matches!(catalog.delete(&[]).await.unwrap_err(), GuardError::InvalidRequest(_)));
        assert!(matches!(
            catalog.delete(&["gone.json".to_string()]).await.unwrap_err(),
            GuardError::NotFound(_)
        ));
    }
}
