//! Audit reports as one pretty-printed JSON file per run.
//!
//! File names follow `<kind>_<YYYYmmdd_HHMMSS>_<run_id>.json`, so a directory
//! listing sorts chronologically and `load` can find a run without parsing
//! every report.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use portalsync_core::ReportStore;
use portalsync_domain::{AuditRecord, MigrateError, Result};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::InfraError;

/// Report store backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    directory: PathBuf,
}

impl JsonReportStore {
    /// A store writing one JSON file per run under `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    /// Directory holding the reports.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path a report is (or will be) written to.
    pub fn path_for(&self, record: &AuditRecord) -> PathBuf {
        self.directory.join(format!(
            "{}_{}_{}.json",
            record.kind,
            record.started_at.format("%Y%m%d_%H%M%S"),
            record.run_id
        ))
    }

    async fn report_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(InfraError::from(err).into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(InfraError::from)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn read_report(path: &Path) -> Result<AuditRecord> {
        let contents = fs::read_to_string(path).await.map_err(InfraError::from)?;
        serde_json::from_str(&contents).map_err(|err| {
            MigrateError::Storage(format!("unreadable report {}: {err}", path.display()))
        })
    }
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn save(&self, record: &AuditRecord) -> Result<()> {
        fs::create_dir_all(&self.directory).await.map_err(InfraError::from)?;

        let path = self.path_for(record);
        let staging = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(record).map_err(InfraError::from)?;

        fs::write(&staging, contents).await.map_err(InfraError::from)?;
        fs::rename(&staging, &path).await.map_err(InfraError::from)?;

        info!(run_id = %record.run_id, kind = %record.kind, path = %path.display(), "report_store.saved");
        Ok(())
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<AuditRecord>> {
        let mut reports = Vec::new();
        for path in self.report_files().await? {
            match Self::read_report(&path).await {
                Ok(report) => reports.push(report),
                Err(err) => warn!(path = %path.display(), error = %err, "report_store.skipped_unreadable"),
            }
        }

        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.run_id.cmp(&a.run_id)));
        if let Some(limit) = limit {
            reports.truncate(limit);
        }
        debug!(count = reports.len(), directory = %self.directory.display(), "report_store.listed");
        Ok(reports)
    }

    async fn load(&self, run_id: &Uuid) -> Result<Option<AuditRecord>> {
        let suffix = format!("_{run_id}.json");
        let files = self.report_files().await?;

        if let Some(path) = files.iter().find(|path| {
            path.file_name().and_then(|name| name.to_str()).is_some_and(|name| name.ends_with(&suffix))
        }) {
            return Self::read_report(path).await.map(Some);
        }

        // Renamed files are still found by content.
        for path in &files {
            if let Ok(report) = Self::read_report(path).await {
                if report.run_id == *run_id {
                    return Ok(Some(report));
                }
            }
        }
        Ok(None)
    }
}
