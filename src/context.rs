//! The process-wide context: built once at startup from the loaded
//! configuration and handed to every component that needs paths, the
//! command runner or the completion backend.

use std::sync::Arc;

use tracing::info;

use crate::config::GuardConfig;
use crate::errors::GuardError;
use crate::llm::{create_backend, CompletionBackend, ManagedBackend};
use crate::query::{QaHistory, QueryService};
use crate::reporting::{ReportCatalog, ReportWriter};
use crate::runner::{CommandExecutor, CommandRunner};
use crate::scans::{ScanContext, ScanRegistry};

pub struct AppContext {
    pub config: GuardConfig,
    pub scans: ScanContext,
    pub registry: ScanRegistry,
    pub writer: ReportWriter,
    pub catalog: ReportCatalog,
    pub query: QueryService,
}

impl AppContext {
    /// Production wiring: real command runner and the configured backend.
    pub fn from_config(config: GuardConfig) -> Result<Self, GuardError> {
        let backend = create_backend(&config.llm)?;
        Self::assemble(config, Arc::new(CommandRunner::new()), Arc::new(backend))
    }

    /// Substitute executor and backend, e.g. for tests.
    pub fn with_parts(
        config: GuardConfig,
        executor: Arc<dyn CommandExecutor>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<Self, GuardError> {
        Self::assemble(config, executor, Arc::new(ManagedBackend::new(backend)))
    }

    fn assemble(
        config: GuardConfig,
        executor: Arc<dyn CommandExecutor>,
        backend: Arc<ManagedBackend>,
    ) -> Result<Self, GuardError> {
        let paths = &config.paths;
        for dir in [&paths.data_dir, &paths.reports_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                GuardError::Config(format!("cannot create directory {}: {}", dir.display(), e))
            })?;
        }
        info!(
            reports_dir = %paths.reports_dir.display(),
            backend = backend.backend_name(),
            model = backend.model_name(),
            "Context ready"
        );

        let scans = ScanContext::new(executor, config.scans.clone(), paths.exploit_db.clone());
        let query = QueryService::new(
            ReportCatalog::new(&paths.reports_dir),
            backend,
            QaHistory::new(paths.history_file(), config.llm.history_limit),
            config.llm.clone(),
        );
        Ok(Self {
            scans,
            registry: ScanRegistry::standard(),
            writer: ReportWriter::new(&paths.reports_dir),
            catalog: ReportCatalog::new(&paths.reports_dir),
            query,
            config,
        })
    }
}
