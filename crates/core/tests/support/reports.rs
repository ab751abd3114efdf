//! In-memory `ReportStore`.

use async_trait::async_trait;
use parking_lot::Mutex;
use portalsync_core::ReportStore;
use portalsync_domain::{AuditRecord, Result};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: Mutex<Vec<AuditRecord>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AuditRecord> {
        self.reports.lock().clone()
    }

    pub fn latest(&self) -> Option<AuditRecord> {
        self.reports.lock().last().cloned()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, record: &AuditRecord) -> Result<()> {
        self.reports.lock().push(record.clone());
        Ok(())
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<AuditRecord>> {
        let mut reports = self.reports.lock().clone();
        reports.reverse();
        if let Some(limit) = limit {
            reports.truncate(limit);
        }
        Ok(reports)
    }

    async fn load(&self, run_id: &Uuid) -> Result<Option<AuditRecord>> {
        Ok(self.reports.lock().iter().find(|r| &r.run_id == run_id).cloned())
    }
}
