//! Port interface for persisted run reports

use async_trait::async_trait;
use portalsync_domain::{AuditRecord, Result};
use uuid::Uuid;

/// Durable storage of audit records, one report per run.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a finished (or aborted) run.
    async fn save(&self, record: &AuditRecord) -> Result<()>;

    /// Reports ordered newest first, optionally capped.
    async fn list(&self, limit: Option<usize>) -> Result<Vec<AuditRecord>>;

    /// Load one report by run id.
    async fn load(&self, run_id: &Uuid) -> Result<Option<AuditRecord>>;
}
