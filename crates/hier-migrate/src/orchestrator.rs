//! Migration Orchestrator
//!
//! Owns the job lifecycle of one migrate invocation:
//! 1. Create a RUNNING job capturing the tenant's current preset key
//! 2. Scan the tenant's full snapshot against the target preset
//! 3. In APPLY mode, commit every HIGH-confidence move in its own transaction,
//!    logging a [`MoveRecord`] alongside it
//! 4. Persist the report and finish the job as COMPLETED
//!
//! Any failure after job creation stops processing, marks the job FAILED and
//! surfaces an [`MigrationError::Execution`]. Moves already committed stay
//! applied; re-running APPLY only picks up what is still non-compliant.

use crate::config::MigratorConfig;
use crate::error::{MigrationError, StoreError};
use crate::job::{
    AppliedMove, JobMode, JobStatus, JobSummary, MigrationJob, MigrationOutcome, MigrationReport,
    MoveRecord,
};
use crate::store::{ItemTransaction, JobStore, TenantDirectory, WorkItemRepository};
use chrono::Utc;
use hier_model::{ActorId, Preset, TenantId, WorkItemId};
use hier_scan::{CompatibilityScanner, RecommendedMove, ScanResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Validated input of one migrate invocation
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    pub tenant_id: TenantId,
    pub to_preset_key: String,
    pub mode: JobMode,
    pub preset: Preset,
    pub actor_id: ActorId,
}

/// Runs migrations against injected collaborators
pub struct MigrationOrchestrator {
    items: Arc<dyn WorkItemRepository>,
    jobs: Arc<dyn JobStore>,
    tenants: Arc<dyn TenantDirectory>,
    scanner: CompatibilityScanner,
    config: MigratorConfig,
}

impl std::fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("scanner", &self.scanner)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MigrationOrchestrator {
    /// Create orchestrator; the scanner anchors on `config.anchor_type`
    #[must_use]
    pub fn new(
        items: Arc<dyn WorkItemRepository>,
        jobs: Arc<dyn JobStore>,
        tenants: Arc<dyn TenantDirectory>,
        config: MigratorConfig,
    ) -> Self {
        Self {
            items,
            jobs,
            tenants,
            scanner: CompatibilityScanner::new().with_anchor(config.anchor_type),
            config,
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Scan the tenant's current snapshot without creating a job
    ///
    /// # Errors
    /// `MigrationError::Store` if the snapshot cannot be read.
    pub async fn preview(
        &self,
        tenant: &TenantId,
        preset: &Preset,
    ) -> Result<ScanResult, MigrationError> {
        let snapshot = self.items.list_items(tenant).await?;
        Ok(self.scanner.scan(&snapshot, preset))
    }

    /// Execute one migration.
    ///
    /// Authorization and input validation are the caller's job.
    ///
    /// # Errors
    /// - `MigrationError::Store` if the job could not be created (nothing happened)
    /// - `MigrationError::Execution` if the job was created and then failed
    #[tracing::instrument(
        skip(self, request),
        fields(tenant = %request.tenant_id, mode = %request.mode, job_id = tracing::field::Empty)
    )]
    pub async fn migrate(
        &self,
        request: &MigrationRequest,
    ) -> Result<MigrationOutcome, MigrationError> {
        let from_preset_key = self.tenants.active_preset_key(&request.tenant_id).await?;
        let mut job = MigrationJob::start(
            request.tenant_id.clone(),
            from_preset_key,
            request.to_preset_key.clone(),
            request.mode,
            request.actor_id.clone(),
        );
        self.jobs.create_job(&job).await?;
        tracing::Span::current().record("job_id", tracing::field::display(job.id));
        tracing::info!(
            from = ?job.from_preset_key,
            to = %job.to_preset_key,
            "migration started"
        );

        match self.run(&mut job, request).await {
            Ok(()) => {
                tracing::info!(
                    moved = job.summary.moved_items,
                    review = job.summary.flagged_for_review,
                    invalid = job.summary.invalid_items,
                    "migration completed"
                );
                Ok(job.outcome())
            }
            Err(err) => Err(self.fail(job, &err).await),
        }
    }

    async fn run(
        &self,
        job: &mut MigrationJob,
        request: &MigrationRequest,
    ) -> Result<(), MigrationError> {
        let snapshot = self.items.list_items(&job.tenant_id).await?;
        let scan = self.scanner.scan(&snapshot, &request.preset);
        tracing::debug!(
            items = snapshot.len(),
            issues = scan.issues.len(),
            review = scan.review_queue.len(),
            "snapshot scanned"
        );

        // LOW-confidence and ambiguous items are never applied
        let planned: Vec<&RecommendedMove> = match job.mode {
            JobMode::DryRun => Vec::new(),
            JobMode::Apply => scan.high_confidence_moves().collect(),
        };
        job.progress.planned_moves = planned.len();

        let mut moved_items = Vec::with_capacity(planned.len());
        for (done, recommended) in planned.into_iter().enumerate() {
            match self.apply_move(job, recommended).await? {
                MoveOutcome::Applied(applied) => {
                    tracing::debug!(
                        item = %applied.item_id,
                        from = ?applied.from_parent_id,
                        to = %applied.to_parent_id,
                        "move applied"
                    );
                    job.progress.applied_moves += 1;
                    job.summary.moved_items += 1;
                    moved_items.push(applied);
                }
                MoveOutcome::Skipped(reason) => {
                    tracing::warn!(
                        item = %recommended.item_id,
                        to = %recommended.to_parent_id,
                        reason = reason.as_str(),
                        "move skipped"
                    );
                    job.progress.skipped_moves += 1;
                }
            }

            let every = self.config.progress_every;
            if every > 0 && (done + 1) % every == 0 && done + 1 < job.progress.planned_moves {
                self.jobs.update_job(job).await?;
            }
        }

        job.summary = JobSummary {
            moved_items: moved_items.len(),
            flagged_for_review: scan.review_queue.len(),
            invalid_items: scan.error_count(),
        };

        let report = MigrationReport {
            job_id: job.id,
            tenant_id: job.tenant_id.clone(),
            mode: job.mode,
            issues: scan.issues,
            review_queue: scan.review_queue,
            recommended_moves: scan.recommended_moves,
            moved_items,
            generated_at: Utc::now(),
        };
        self.jobs.save_report(&report).await?;

        if job.mode == JobMode::Apply && self.config.activate_preset_on_apply {
            self.tenants
                .set_active_preset_key(&job.tenant_id, &job.to_preset_key)
                .await?;
        }

        // The job only becomes COMPLETED once that state is durable
        let mut finished = job.clone();
        finished.transition(JobStatus::Completed)?;
        finished.finished_at = Some(Utc::now());
        self.jobs.update_job(&finished).await?;
        *job = finished;
        Ok(())
    }

    /// Reparent one item in a single transaction.
    ///
    /// The item is left alone when it no longer exists, already sits under
    /// the target parent, or is an ancestor of the target parent.
    async fn apply_move(
        &self,
        job: &MigrationJob,
        recommended: &RecommendedMove,
    ) -> Result<MoveOutcome, StoreError> {
        let moved_at = Utc::now();
        let mut outcome = MoveOutcome::Skipped(SkipReason::Vanished);

        self.items
            .run_transaction(&job.tenant_id, &mut |tx: &mut dyn ItemTransaction| {
                outcome = MoveOutcome::Skipped(SkipReason::Vanished);

                let Some(mut item) = tx.get_item(&recommended.item_id) else {
                    return Ok(());
                };
                let next_parent_id = recommended.to_parent_id.clone();
                if item.parent_id.as_ref() == Some(&next_parent_id) {
                    outcome = MoveOutcome::Skipped(SkipReason::AlreadyPlaced);
                    return Ok(());
                }
                if is_ancestor_of(tx, &item.id, &next_parent_id) {
                    outcome = MoveOutcome::Skipped(SkipReason::WouldCycle);
                    return Ok(());
                }

                let prev_parent_id = item.parent_id.clone();
                let mut prev_position = None;
                if let Some(mut prev) = prev_parent_id.as_ref().and_then(|id| tx.get_item(id)) {
                    prev_position = prev.remove_child(&item.id);
                    if prev_position.is_some() {
                        tx.put_item(prev)?;
                    }
                }
                let mut added_to_next = false;
                if let Some(mut next) = tx.get_item(&next_parent_id) {
                    added_to_next = next.add_child(item.id.clone());
                    if added_to_next {
                        tx.put_item(next)?;
                    }
                }

                item.parent_id = Some(next_parent_id.clone());
                let item_id = item.id.clone();
                tx.put_item(item)?;

                tx.append_move(MoveRecord {
                    seq: 0,
                    job_id: job.id,
                    item_id: item_id.clone(),
                    prev_parent_id: prev_parent_id.clone(),
                    next_parent_id: Some(next_parent_id.clone()),
                    prev_position,
                    added_to_next,
                    moved_at,
                    actor_id: job.actor_id.clone(),
                });
                outcome = MoveOutcome::Applied(AppliedMove {
                    item_id,
                    from_parent_id: prev_parent_id,
                    to_parent_id: next_parent_id,
                    moved_at,
                });
                Ok(())
            })
            .await?;

        Ok(outcome)
    }

    /// Mark the job FAILED and build the error surfaced to the caller
    async fn fail(&self, mut job: MigrationJob, err: &MigrationError) -> MigrationError {
        let message = err.to_string();
        tracing::error!(
            error = %message,
            applied = job.progress.applied_moves,
            "migration failed"
        );

        job.error = Some(message.clone());
        job.finished_at = Some(Utc::now());
        match job.transition(JobStatus::Failed) {
            Ok(()) => {
                if let Err(persist) = self.jobs.update_job(&job).await {
                    tracing::error!(error = %persist, "could not record job failure");
                }
            }
            Err(illegal) => tracing::error!(error = %illegal, "could not record job failure"),
        }

        MigrationError::Execution {
            job_id: job.id,
            message,
        }
    }
}

enum MoveOutcome {
    Applied(AppliedMove),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    Vanished,
    AlreadyPlaced,
    WouldCycle,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Vanished => "item no longer exists",
            Self::AlreadyPlaced => "already under target parent",
            Self::WouldCycle => "target parent is a descendant",
        }
    }
}

/// Walk up from `start`; true if `ancestor` is on the chain (or is `start`)
fn is_ancestor_of(tx: &dyn ItemTransaction, ancestor: &WorkItemId, start: &WorkItemId) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = Some(start.clone());
    while let Some(id) = cursor {
        if &id == ancestor {
            return true;
        }
        if !seen.insert(id.clone()) {
            // Pre-existing loop that does not pass through `ancestor`
            return false;
        }
        cursor = tx.get_item(&id).and_then(|item| item.parent_id);
    }
    false
}
