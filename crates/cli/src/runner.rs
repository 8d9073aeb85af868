//! Report orchestration: runs the diagnostics for one command and writes
//! the resulting files or JSON.

use std::io::Write;
use std::path::{Path, PathBuf};

use scanfme_core::diagnostics::DiagnosticsSnapshot;
use scanfme_core::error::CoreError;
use scanfme_core::report::{
    render_collection_report, render_worker_report, report_file_name, ReportKind,
};
use scanfme_core::store::DocumentStore;
use scanfme_core::types::Platform;
use scanfme_db::{DiagnosticsAggregator, MemoryStore};
use tempfile::NamedTempFile;

use crate::cli::Command;

/// Load an offline snapshot file into a [`MemoryStore`].
pub fn load_snapshot(path: &Path) -> Result<MemoryStore, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CoreError::InvalidArgument(format!("Cannot read snapshot {}: {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        CoreError::InvalidArgument(format!("Snapshot {} is not valid JSON: {e}", path.display()))
    })?;
    MemoryStore::from_snapshot(value)
}

/// Render into a temporary file next to `path`, then move it into place.
///
/// A failed render leaves no file behind and keeps any previous report.
pub fn write_atomically<T>(
    path: &Path,
    render: impl FnOnce(&mut NamedTempFile) -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    let out = render(&mut tmp)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CoreError::Write(e.error.to_string()))?;
    Ok(out)
}

pub struct Runner<S> {
    aggregator: DiagnosticsAggregator<S>,
    platform: Platform,
    output_dir: PathBuf,
}

impl<S: DocumentStore> Runner<S> {
    pub fn new(aggregator: DiagnosticsAggregator<S>, platform: Platform, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            aggregator,
            platform,
            output_dir: output_dir.into(),
        }
    }

    /// Run `command`, writing any console output to `out`.
    ///
    /// The store must answer its liveness probe before anything is queried.
    pub async fn execute(&self, command: &Command, out: &mut impl Write) -> Result<(), CoreError> {
        self.aggregator.ensure_connected().await?;

        match command {
            Command::Check => {
                writeln!(out, "{} database is reachable", self.platform)?;
            }
            Command::Diagnose { scope } => {
                let snapshot = self.diagnose(*scope).await?;
                let json = serde_json::to_string_pretty(&snapshot)
                    .map_err(|e| CoreError::Write(e.to_string()))?;
                writeln!(out, "{json}")?;
            }
            Command::Collections {
                scope,
                name,
                allow_partial,
            } => {
                let path = self.collections(*scope, name, *allow_partial).await?;
                writeln!(out, "{}", path.display())?;
            }
            Command::Workers { scope, name } => {
                let path = self.workers(*scope, name).await?;
                writeln!(out, "{}", path.display())?;
            }
        }
        Ok(())
    }

    pub async fn diagnose(&self, scope_flag: i64) -> Result<DiagnosticsSnapshot, CoreError> {
        let scope = self.aggregator.scope(scope_flag)?;
        self.aggregator.snapshot(self.platform, &scope).await
    }

    /// Write the collection summary report and return its path.
    ///
    /// Unless `allow_partial` is set, any failed collection count aborts the
    /// report before a file is created.
    pub async fn collections(
        &self,
        scope_flag: i64,
        base_name: &str,
        allow_partial: bool,
    ) -> Result<PathBuf, CoreError> {
        let scope = self.aggregator.scope(scope_flag)?;
        let stats = self.aggregator.collection_stats(&scope).await;
        if allow_partial {
            for failure in stats.failures() {
                tracing::warn!(
                    collection = %failure.collection,
                    error = %failure.message,
                    "Writing report without this collection's count",
                );
            }
        } else {
            stats.ensure_complete()?;
        }
        let datasets = self.aggregator.dataset_diagnosis(&scope).await?;

        let path = self
            .output_dir
            .join(report_file_name(ReportKind::Collections, self.platform, &scope, base_name));
        write_atomically(&path, |file| {
            render_collection_report(file, &scope, &stats, &datasets)
        })?;

        tracing::info!(
            platform = %self.platform,
            scope = %scope,
            path = %path.display(),
            complete = stats.is_complete(),
            "Collection report written",
        );
        Ok(path)
    }

    /// Write the worker version report and return its path.
    pub async fn workers(&self, scope_flag: i64, base_name: &str) -> Result<PathBuf, CoreError> {
        let scope = self.aggregator.scope(scope_flag)?;
        let diagnosis = self.aggregator.worker_diagnosis(&scope).await?;

        let path = self
            .output_dir
            .join(report_file_name(ReportKind::Workers, self.platform, &scope, base_name));
        let rows = write_atomically(&path, |file| render_worker_report(file, &diagnosis))?;

        tracing::info!(
            platform = %self.platform,
            scope = %scope,
            path = %path.display(),
            rows,
            "Worker report written",
        );
        Ok(path)
    }
}
