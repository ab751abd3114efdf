//! Sequences the phases of one run and flushes its report.
//!
//! Phase order is fixed: schemas and properties, pipelines, records (in
//! [`ObjectType::migration_rank`] order), then associations. An `Auth` or
//! `Config` error anywhere, or an exhausted transient error in the schema or
//! pipeline phase, aborts the run; the partial audit record is saved anyway.

use std::sync::Arc;

use portalsync_domain::constants::DEFAULT_BATCH_SIZE;
use portalsync_domain::{
    AuditRecord, MigrateError, MigrationPlan, MigrationSettings, ObjectType, Result, RunKind,
};
use tracing::{error, info, warn};

use super::{
    default_pairs, schema_phase_error, AssociationMigrator, MigrateOptions, ObjectMigrator,
    PipelineMigrator, PropertyMigrator, RunContext,
};
use crate::filter::FieldFilter;
use crate::portal::CrmPortal;
use crate::rollback::{prior_mappings, ReportStore};

/// Knobs for a full migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Object types to migrate; `None` means all standard and custom types.
    pub types: Option<Vec<ObjectType>>,
    /// Cap per object type.
    pub limit: Option<usize>,
    /// Skip the property and schema phase.
    pub skip_properties: bool,
    /// Skip the association phase.
    pub skip_associations: bool,
    /// Pairs per association create call.
    pub batch_size: usize,
    /// Fail contacts without an email.
    pub skip_contacts_without_email: bool,
    /// Mark the report as a dry run.
    pub dry_run: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            types: None,
            limit: None,
            skip_properties: false,
            skip_associations: false,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_contacts_without_email: true,
            dry_run: false,
        }
    }
}

impl RunSettings {
    /// Settings from the `[migration]` config section.
    pub fn from_config(settings: &MigrationSettings) -> Self {
        Self {
            limit: settings.default_limit,
            batch_size: settings.batch_size,
            skip_contacts_without_email: settings.skip_contacts_without_email,
            ..Self::default()
        }
    }
}

/// Audit record of a finished run and the fatal error that ended it early, if any.
#[derive(Debug)]
pub struct RunOutcome {
    /// Report of the run, saved even when it aborted.
    pub audit: AuditRecord,
    /// The error that aborted the run, if any.
    pub error: Option<MigrateError>,
}

impl RunOutcome {
    /// Whether the run stopped early.
    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs the schema, record and association phases for a migration or a plan.
pub struct MigrationRunner {
    source: Arc<dyn CrmPortal>,
    reports: Arc<dyn ReportStore>,
    properties: PropertyMigrator,
    pipelines: PipelineMigrator,
    objects: ObjectMigrator,
    associations: AssociationMigrator,
    settings: RunSettings,
}

impl MigrationRunner {
    /// `destination` should already be wrapped in a
    /// [`DryRunPortal`](crate::portal::DryRunPortal) when `settings.dry_run` is set.
    pub fn new(
        source: Arc<dyn CrmPortal>,
        destination: Arc<dyn CrmPortal>,
        reports: Arc<dyn ReportStore>,
        filter: FieldFilter,
        settings: RunSettings,
    ) -> Self {
        let filter = Arc::new(filter);
        Self {
            properties: PropertyMigrator::new(source.clone(), destination.clone(), filter.clone()),
            pipelines: PipelineMigrator::new(source.clone(), destination.clone()),
            objects: ObjectMigrator::new(source.clone(), destination.clone(), filter)
                .skip_contacts_without_email(settings.skip_contacts_without_email),
            associations: AssociationMigrator::new(source.clone(), destination)
                .with_batch_size(settings.batch_size),
            source,
            reports,
            settings,
        }
    }

    /// Migrate every selected object type.
    pub async fn run_all(&self) -> Result<RunOutcome> {
        let mut context = self.start(RunContext::new(RunKind::Migration, self.settings.dry_run)).await?;
        info!(run_id = %context.audit.run_id, dry_run = self.settings.dry_run, "runner.started");
        let result = self.migrate_all(&mut context).await;
        self.flush(context, result).await
    }

    /// Migrate exactly the records a resolved plan names.
    pub async fn run_plan(&self, plan: MigrationPlan) -> Result<RunOutcome> {
        let empty = plan.is_empty();
        let mut context = self.start(RunContext::for_plan(plan.clone(), self.settings.dry_run)).await?;
        info!(
            run_id = %context.audit.run_id,
            primary = %plan.primary_object_type,
            records = plan.total_records(),
            "runner.plan_started"
        );
        let result = if empty {
            info!("runner.empty_plan");
            Ok(())
        } else {
            self.migrate_plan(&mut context, &plan).await
        };
        self.flush(context, result).await
    }

    async fn start(&self, mut context: RunContext) -> Result<RunContext> {
        let history = self.reports.list(None).await?;
        let prior = prior_mappings(&history);
        if !prior.is_empty() {
            info!(mappings = prior.len(), "runner.prior_mappings_loaded");
        }
        context.seed_mappings(prior);
        Ok(context)
    }

    async fn flush(&self, context: RunContext, result: Result<()>) -> Result<RunOutcome> {
        let mut audit = context.into_audit();
        let error = result.err();
        if let Some(err) = &error {
            error!(run_id = %audit.run_id, error = %err, "runner.aborted");
            audit.aborted = true;
            audit.record_error(format!("run aborted: {err}"));
        }
        self.reports.save(&audit).await?;
        info!(
            run_id = %audit.run_id,
            created = audit.created_total(),
            updated = audit.updated_total(),
            failed = audit.failed_total(),
            associations = audit.associations_created(),
            "runner.completed"
        );
        Ok(RunOutcome { audit, error })
    }

    async fn migrate_all(&self, context: &mut RunContext) -> Result<()> {
        let mut types: Vec<ObjectType> = match &self.settings.types {
            Some(types) => types.clone(),
            None => ObjectType::STANDARD.to_vec(),
        };
        let wanted_custom: Option<Vec<ObjectType>> =
            self.settings.types.as_ref().map(|types| types.iter().filter(|t| t.is_custom()).cloned().collect());

        let custom = self.schema_phase(context, wanted_custom.as_deref()).await?;
        if self.settings.types.is_none() {
            types.extend(custom.iter().cloned());
        }
        types.sort_by(|a, b| a.migration_rank().cmp(&b.migration_rank()).then_with(|| a.cmp(b)));
        types.dedup();

        self.property_phase(context, &types).await?;
        self.pipeline_phase(context, &types).await?;

        let options = MigrateOptions::all().with_limit(self.settings.limit);
        for object_type in &types {
            self.objects.migrate(context, object_type, &options).await?;
        }

        self.association_phase(context, &custom).await
    }

    async fn migrate_plan(&self, context: &mut RunContext, plan: &MigrationPlan) -> Result<()> {
        let types = plan.object_types();
        let wanted_custom: Vec<ObjectType> = types.iter().filter(|t| t.is_custom()).cloned().collect();
        let custom = self.schema_phase(context, Some(&wanted_custom)).await?;

        self.property_phase(context, &types).await?;
        self.pipeline_phase(context, &types).await?;

        for object_type in &types {
            let ids = plan.ids_for(object_type).cloned().unwrap_or_default();
            if ids.is_empty() {
                continue;
            }
            let options = MigrateOptions::ids(ids);
            self.objects.migrate(context, object_type, &options).await?;
        }

        self.association_phase(context, &custom).await
    }

    /// Custom object schemas; returns the custom types to migrate.
    async fn schema_phase(
        &self,
        context: &mut RunContext,
        wanted: Option<&[ObjectType]>,
    ) -> Result<Vec<ObjectType>> {
        if wanted.is_some_and(<[ObjectType]>::is_empty) {
            return Ok(Vec::new());
        }
        if self.settings.skip_properties {
            let schemas = match self.source.list_object_schemas().await {
                Ok(schemas) => schemas,
                Err(err) => {
                    let message = schema_phase_error(err)?;
                    context.audit.record_error(format!("custom object schemas: {message}"));
                    return Ok(Vec::new());
                }
            };
            return Ok(schemas
                .into_iter()
                .map(|schema| ObjectType::custom(schema.name))
                .filter(|t| wanted.map_or(true, |wanted| wanted.contains(t)))
                .collect());
        }

        match self.properties.migrate_schemas(context, wanted).await {
            Ok(types) => Ok(types),
            Err(err) => {
                let message = schema_phase_error(err)?;
                warn!(error = %message, "runner.schema_phase_failed");
                context.audit.record_error(format!("custom object schemas: {message}"));
                Ok(Vec::new())
            }
        }
    }

    async fn property_phase(&self, context: &mut RunContext, types: &[ObjectType]) -> Result<()> {
        if self.settings.skip_properties {
            return Ok(());
        }
        for object_type in types {
            if let Err(err) = self.properties.migrate_properties(context, object_type).await {
                let message = schema_phase_error(err)?;
                context.mark_invalid(object_type.clone(), format!("properties: {message}"));
            }
        }
        Ok(())
    }

    async fn pipeline_phase(&self, context: &mut RunContext, types: &[ObjectType]) -> Result<()> {
        for object_type in types.iter().filter(|t| t.has_pipelines()) {
            if context.invalid_reason(object_type).is_some() {
                continue;
            }
            if let Err(err) = self.pipelines.migrate(context, object_type).await {
                let message = schema_phase_error(err)?;
                context.mark_invalid(object_type.clone(), format!("pipelines: {message}"));
            }
        }
        Ok(())
    }

    async fn association_phase(&self, context: &mut RunContext, custom: &[ObjectType]) -> Result<()> {
        if self.settings.skip_associations {
            return Ok(());
        }
        self.associations.migrate(context, &default_pairs(custom)).await?;
        Ok(())
    }
}
