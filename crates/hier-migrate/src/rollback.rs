//! Rollback Executor
//!
//! Replays a COMPLETED job's move log backwards, most recent move first, and
//! finishes the job as ROLLED_BACK. Moves sharing a timestamp are undone in
//! reverse append order.

use crate::error::{MigrationError, PreconditionError, StoreError};
use crate::job::{JobStatus, MoveRecord, RollbackOutcome};
use crate::store::{ItemTransaction, JobStore, WorkItemRepository};
use chrono::Utc;
use hier_model::{ActorId, JobId, TenantId};
use std::sync::Arc;

/// Reverses completed migrations
pub struct RollbackExecutor {
    items: Arc<dyn WorkItemRepository>,
    jobs: Arc<dyn JobStore>,
}

impl std::fmt::Debug for RollbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackExecutor").finish_non_exhaustive()
    }
}

/// Undo order: newest `moved_at` first, then highest `seq`
pub fn undo_order(moves: &mut [MoveRecord]) {
    moves.sort_by(|a, b| b.moved_at.cmp(&a.moved_at).then(b.seq.cmp(&a.seq)));
}

impl RollbackExecutor {
    /// Create executor
    #[inline]
    #[must_use]
    pub fn new(items: Arc<dyn WorkItemRepository>, jobs: Arc<dyn JobStore>) -> Self {
        Self { items, jobs }
    }

    /// Roll back `job_id`.
    ///
    /// # Errors
    /// - `MigrationError::Precondition` if the job is missing or not COMPLETED;
    ///   nothing is mutated
    /// - `MigrationError::Execution` if a revert fails part way; the job stays
    ///   COMPLETED so the rollback can be retried
    #[tracing::instrument(skip(self), fields(tenant = %tenant, job_id = %job_id))]
    pub async fn rollback(
        &self,
        tenant: &TenantId,
        job_id: JobId,
        actor: &ActorId,
    ) -> Result<RollbackOutcome, MigrationError> {
        let job = self
            .jobs
            .get_job(tenant, job_id)
            .await?
            .ok_or(PreconditionError::JobNotFound(job_id))?;
        if job.status != JobStatus::Completed {
            return Err(PreconditionError::NotCompleted {
                job_id,
                status: job.status,
            }
            .into());
        }

        let mut moves = self.jobs.list_moves(tenant, job_id).await?;
        undo_order(&mut moves);
        tracing::info!(moves = moves.len(), "rollback started");

        let mut outcome = RollbackOutcome {
            job_id,
            restored_moves: 0,
            skipped_moves: 0,
        };
        for record in &moves {
            let restored = self
                .revert(tenant, record)
                .await
                .map_err(|err| Self::execution(job_id, &err))?;
            if restored {
                tracing::debug!(item = %record.item_id, to = ?record.prev_parent_id, "move reverted");
                outcome.restored_moves += 1;
            } else {
                tracing::warn!(item = %record.item_id, "move not reverted, item no longer exists");
                outcome.skipped_moves += 1;
            }
        }

        let mut finished = job;
        finished.transition(JobStatus::RolledBack)?;
        finished.rolled_back_at = Some(Utc::now());
        finished.rolled_back_by = Some(actor.clone());
        self.jobs
            .update_job(&finished)
            .await
            .map_err(|err| Self::execution(job_id, &err))?;

        tracing::info!(
            restored = outcome.restored_moves,
            skipped = outcome.skipped_moves,
            "rollback completed"
        );
        Ok(outcome)
    }

    /// Put one item back where the record found it
    async fn revert(&self, tenant: &TenantId, record: &MoveRecord) -> Result<bool, StoreError> {
        let mut restored = false;

        self.items
            .run_transaction(tenant, &mut |tx: &mut dyn ItemTransaction| {
                restored = false;

                let Some(mut item) = tx.get_item(&record.item_id) else {
                    return Ok(());
                };

                // An entry the move did not add predates it and stays
                if let Some(mut next) = record
                    .next_parent_id
                    .as_ref()
                    .filter(|_| record.added_to_next)
                    .and_then(|id| tx.get_item(id))
                {
                    if next.remove_child(&item.id).is_some() {
                        tx.put_item(next)?;
                    }
                }
                // Without a recorded position the item was never listed there
                if let (Some(mut prev), Some(position)) = (
                    record.prev_parent_id.as_ref().and_then(|id| tx.get_item(id)),
                    record.prev_position,
                ) {
                    if prev.insert_child_at(position, item.id.clone()) {
                        tx.put_item(prev)?;
                    }
                }

                item.parent_id = record.prev_parent_id.clone();
                tx.put_item(item)?;
                restored = true;
                Ok(())
            })
            .await?;

        Ok(restored)
    }

    fn execution(job_id: JobId, err: &StoreError) -> MigrationError {
        tracing::error!(error = %err, "rollback failed");
        MigrationError::Execution {
            job_id,
            message: err.to_string(),
        }
    }
}
