// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! The per-replica drain operation.
//!
//! One task walks: skip checks -> placement -> remote copy -> verify ->
//! remove. On the happy path the original replica is removed; when the
//! copy or its verification fails, the removal target flips to the new
//! copy instead, so that exactly one physical copy survives either way.
//! Only a failed removal leaves both copies behind, which is the single
//! most severe error kind.
//!
//! Every outcome is fully contained: a task appends at most one error
//! entry and never propagates anything to its worker.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogError, CatalogReplica, PlacementHints};
use crate::config::DrainSettings;
use crate::copy::{self, CopyClient, CopyError};
use crate::report::ErrorList;
use crate::types::{DrainTask, ReplicaStatus, TaskErrorKind, TaskOutcome};

/// Everything a worker needs to process tasks. Shared read-only.
pub(crate) struct DrainContext {
    pub catalog: Arc<dyn Catalog>,
    pub copy: Arc<dyn CopyClient>,
    pub settings: DrainSettings,
    /// Scope-level placement constraints (move target); the per-replica
    /// space token is filled in per task
    pub base_hints: PlacementHints,
    pub errors: ErrorList,
}

impl DrainContext {
    async fn record_error(&self, task: &DrainTask, kind: TaskErrorKind, detail: String) {
        self.errors
            .push(crate::types::ErrorEntry {
                lfn: task.lfn.clone(),
                sfn: task.record.sfn.clone(),
                kind,
                detail,
            })
            .await;
    }
}

/// Run the drain state machine for one task.
pub(crate) async fn drain_one(
    ctx: &DrainContext,
    task: &DrainTask,
    cancel: &mut watch::Receiver<bool>,
) -> TaskOutcome {
    let record = &task.record;

    match record.status {
        ReplicaStatus::UnderPopulation => {
            warn!(sfn = %record.sfn, "Replica is under population, ignored");
            ctx.record_error(
                task,
                TaskErrorKind::UnderPopulation,
                "The file is under population".to_string(),
            )
            .await;
            return TaskOutcome::Skipped(TaskErrorKind::UnderPopulation);
        }
        ReplicaStatus::ToBeDeleted => {
            info!(
                lfn = %task.lfn,
                sfn = %record.sfn,
                "File is under deletion, removing the logical entry"
            );
            return match ctx.catalog.unlink(&task.lfn).await {
                Ok(()) => TaskOutcome::DeletedDirectly,
                Err(e) => {
                    ctx.record_error(
                        task,
                        TaskErrorKind::CleanupFailed,
                        format!("Could not unlink the file marked for deletion: {}", e),
                    )
                    .await;
                    TaskOutcome::Failed(TaskErrorKind::CleanupFailed)
                }
            };
        }
        ReplicaStatus::Available => {}
    }

    if record.is_pinned(Utc::now()) {
        warn!(sfn = %record.sfn, "Replica is currently pinned, ignored");
        ctx.record_error(
            task,
            TaskErrorKind::Pinned,
            "The file is pinned".to_string(),
        )
        .await;
        return TaskOutcome::Skipped(TaskErrorKind::Pinned);
    }

    let mut hints = ctx.base_hints.clone();
    hints.space_token = record.space_token.clone();
    if let Some(token) = &record.space_token {
        debug!(lfn = %task.lfn, space_token = %token, "Replica belongs to a space token");
    }

    // Placement: without a destination there is nothing to clean up.
    let location = match ctx.catalog.where_to_write(&task.lfn, &hints).await {
        Ok(location) => location,
        Err(e) => {
            ctx.record_error(task, TaskErrorKind::ReplicationFailed, e.to_string())
                .await;
            return TaskOutcome::Failed(TaskErrorKind::ReplicationFailed);
        }
    };
    let (destination, new_sfn) =
        match copy::rewrite_destination(&location, ctx.settings.http_port) {
            Ok(parts) => parts,
            Err(e) => {
                ctx.record_error(task, TaskErrorKind::ReplicationFailed, e.to_string())
                    .await;
                return TaskOutcome::Failed(TaskErrorKind::ReplicationFailed);
            }
        };
    let source = match copy::source_url(&record.server, ctx.settings.https_port, &task.lfn) {
        Ok(url) => url,
        Err(e) => {
            ctx.record_error(task, TaskErrorKind::ReplicationFailed, e.to_string())
                .await;
            return TaskOutcome::Failed(TaskErrorKind::ReplicationFailed);
        }
    };

    info!(lfn = %task.lfn, destination = %new_sfn, "Replicating");
    let copy_result = tokio::select! {
        result = ctx.copy.copy(&source, &destination) => result,
        _ = wait_cancelled(cancel) => Err(CopyError::Cancelled),
    };

    if let Err(e) = copy_result {
        warn!(lfn = %task.lfn, destination = %new_sfn, error = %e, "Copy failed");
        return fail_and_clean(
            ctx,
            task,
            &new_sfn,
            TaskErrorKind::ReplicationFailed,
            format!("Error while copying to SFN: {} with error: {}", new_sfn, e),
        )
        .await;
    }

    // Verify the new copy before touching the original.
    match ctx.catalog.replica_by_rfn(&new_sfn).await {
        Ok(replica) if replica.status == ReplicaStatus::Available => {}
        Ok(_) => {
            warn!(lfn = %task.lfn, new_sfn = %new_sfn, "New replica is not available");
            return fail_and_clean(
                ctx,
                task,
                &new_sfn,
                TaskErrorKind::VerificationFailed,
                "Error while updating the replica status".to_string(),
            )
            .await;
        }
        Err(e) => {
            warn!(lfn = %task.lfn, new_sfn = %new_sfn, error = %e, "Replica status check failed");
            return fail_and_clean(
                ctx,
                task,
                &new_sfn,
                TaskErrorKind::VerificationFailed,
                format!("Error while checking the replica status: {}", e),
            )
            .await;
        }
    }
    info!(lfn = %task.lfn, destination = %new_sfn, "File correctly replicated");

    // Remove the original.
    let original = match ctx.catalog.replica_by_rfn(&record.sfn).await {
        Ok(replica) => replica,
        Err(e) => {
            ctx.record_error(
                task,
                TaskErrorKind::CleanupFailed,
                format!(
                    "Error while getting the original replica from the catalog, cannot drain: {}",
                    e
                ),
            )
            .await;
            return TaskOutcome::Failed(TaskErrorKind::CleanupFailed);
        }
    };
    match remove_with_retry(ctx, &original).await {
        Ok(()) => {
            info!(lfn = %task.lfn, sfn = %record.sfn, "Original replica removed, drain complete");
            TaskOutcome::Drained
        }
        Err(e) => {
            ctx.record_error(
                task,
                TaskErrorKind::CleanupFailed,
                format!("Could not remove the original replica: {}", e),
            )
            .await;
            TaskOutcome::Failed(TaskErrorKind::CleanupFailed)
        }
    }
}

/// Failure path once a destination is known: remove the new copy so the
/// original stays the only one, then record the error. If the cleanup
/// itself fails the single recorded entry escalates to `CleanupFailed`.
async fn fail_and_clean(
    ctx: &DrainContext,
    task: &DrainTask,
    new_sfn: &str,
    kind: TaskErrorKind,
    detail: String,
) -> TaskOutcome {
    match clean_new_copy(ctx, new_sfn).await {
        Ok(()) => {
            ctx.record_error(task, kind, detail).await;
            TaskOutcome::Failed(kind)
        }
        Err(clean_detail) => {
            ctx.record_error(
                task,
                TaskErrorKind::CleanupFailed,
                format!("{}; {}", detail, clean_detail),
            )
            .await;
            TaskOutcome::Failed(TaskErrorKind::CleanupFailed)
        }
    }
}

async fn clean_new_copy(ctx: &DrainContext, new_sfn: &str) -> Result<(), String> {
    let replica = match ctx.catalog.replica_by_rfn(new_sfn).await {
        Ok(replica) => replica,
        // The copy never materialised; there is nothing to clean.
        Err(CatalogError::NotFound(_)) => return Ok(()),
        Err(e) => {
            return Err(format!(
                "Error while getting the new replica from the catalog, cannot clean: {}",
                e
            ));
        }
    };
    remove_with_retry(ctx, &replica)
        .await
        .map_err(|e| format!("Could not clean the new replica: {}", e))
}

/// The bounded-retry removal. After the pool driver removes the
/// physical file the catalog row is deleted best-effort; the driver may
/// already have cleaned it.
async fn remove_with_retry(
    ctx: &DrainContext,
    replica: &CatalogReplica,
) -> Result<(), CatalogError> {
    let attempts = ctx.settings.removal_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match ctx.catalog.remove_replica(replica).await {
            Ok(()) => {
                if let Err(e) = ctx.catalog.delete_replica(&replica.rfn).await {
                    debug!(rfn = %replica.rfn, error = %e, "Catalog row already cleaned");
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    rfn = %replica.rfn,
                    attempt,
                    attempts,
                    error = %e,
                    "Replica removal attempt failed"
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(ctx.settings.removal_backoff()).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| CatalogError::Remote("removal failed".to_string())))
}

/// Resolves when cancellation is requested; pends forever if the
/// session is gone (no sender), so it never spuriously wins a select.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
