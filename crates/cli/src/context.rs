//! Wiring of configuration into portals, the report store and the run lock.

use std::sync::Arc;

use anyhow::Context;
use portalsync_core::{CrmPortal, DryRunPortal, FieldFilter, ReportStore};
use portalsync_domain::AppConfig;
use portalsync_infra::{HubSpotPortal, JsonReportStore, RunLock};

pub struct AppContext {
    pub config: AppConfig,
    pub dry_run: bool,
    pub json: bool,
    reports: Arc<JsonReportStore>,
}

impl AppContext {
    pub fn new(config: AppConfig, dry_run: bool, json: bool) -> Self {
        let reports = Arc::new(JsonReportStore::new(config.output.reports_directory.clone()));
        Self { config, dry_run, json, reports }
    }

    pub fn reports(&self) -> Arc<dyn ReportStore> {
        self.reports.clone()
    }

    pub fn source(&self) -> anyhow::Result<Arc<dyn CrmPortal>> {
        let portal = HubSpotPortal::from_config("source", &self.config.source, &self.config.migration)
            .context("Failed to build source portal client")?;
        Ok(Arc::new(portal))
    }

    /// Destination portal; wrapped so writes are simulated under `--dry-run`.
    pub fn destination(&self) -> anyhow::Result<Arc<dyn CrmPortal>> {
        let portal: Arc<dyn CrmPortal> = Arc::new(
            HubSpotPortal::from_config("destination", &self.config.destination, &self.config.migration)
                .context("Failed to build destination portal client")?,
        );
        if self.dry_run {
            Ok(Arc::new(DryRunPortal::new(portal)))
        } else {
            Ok(portal)
        }
    }

    pub fn field_filter(&self) -> anyhow::Result<FieldFilter> {
        FieldFilter::with_overrides(&self.config.field_filters).context("Invalid field filter overrides")
    }

    /// Exclusive lock over the reports directory for commands that write.
    pub fn lock(&self) -> anyhow::Result<RunLock> {
        Ok(RunLock::acquire(self.reports.directory())?)
    }
}
