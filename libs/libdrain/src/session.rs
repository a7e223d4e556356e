// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! The drain session: one bounded run over one resolved scope.
//!
//! A session owns all mutable shared state explicitly -- the task
//! queue, the error list and the cancellation channel -- and hands it
//! to a fixed pool of workers. Nothing here is ambient or global.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::admin::{AdminBackend, mark_readonly};
use crate::catalog::{Catalog, PlacementHints};
use crate::config::{DrainPlan, DrainSettings};
use crate::copy::CopyClient;
use crate::drain::{DrainContext, drain_one};
use crate::error::DrainError;
use crate::inventory::{Inventory, resolve_scope};
use crate::planner::plan_tasks;
use crate::report::{DrainReport, ErrorList, PlanSummary, RunCounters};
use crate::types::{DrainScope, DrainTask, FsInfo, FsStatus, TaskOutcome};

/// Requests cancellation of a running session. Cheap to clone and safe
/// to trip from a signal handler task.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace updates the value even when no worker has
        // subscribed yet, so a cancel before execute() still sticks.
        self.tx.send_replace(true);
    }
}

/// The plan applied to the live inventory: what will actually run.
pub struct PreparedDrain {
    pub tasks: Vec<DrainTask>,
    pub summary: PlanSummary,
    filesystems: Vec<FsInfo>,
}

/// One drain run. Construct, `prepare()`, then `execute()` unless the
/// plan is a dry run.
pub struct DrainSession {
    plan: DrainPlan,
    settings: DrainSettings,
    inventory: Arc<dyn Inventory>,
    catalog: Arc<dyn Catalog>,
    admin: Arc<dyn AdminBackend>,
    copy: Arc<dyn CopyClient>,
    errors: ErrorList,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl DrainSession {
    pub fn new(
        plan: DrainPlan,
        settings: DrainSettings,
        inventory: Arc<dyn Inventory>,
        catalog: Arc<dyn Catalog>,
        admin: Arc<dyn AdminBackend>,
        copy: Arc<dyn CopyClient>,
    ) -> Result<Self, DrainError> {
        plan.validate()?;
        let (cancel_tx, _) = watch::channel(false);
        Ok(Self {
            plan,
            settings,
            inventory,
            catalog,
            admin,
            copy,
            errors: ErrorList::new(),
            cancel_tx: Arc::new(cancel_tx),
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Resolve the scope and build the bounded task list. Read-only:
    /// no admin calls, no copies, nothing mutated anywhere.
    pub async fn prepare(&self) -> Result<PreparedDrain, DrainError> {
        let gid = match &self.plan.group {
            None => None,
            Some(group) => Some(
                self.inventory
                    .group_id(group)
                    .await?
                    .ok_or_else(|| {
                        DrainError::ConfigurationInvalid(format!("Unknown group: {}", group))
                    })?,
            ),
        };

        let resolved = resolve_scope(self.inventory.as_ref(), &self.plan).await?;
        let filesystems = resolved.filesystems;
        let (tasks, summary) = plan_tasks(resolved.tasks, gid, self.plan.size_percent);

        info!(
            scope = %self.plan.scope,
            scheduled = summary.scheduled_files,
            scheduled_bytes = summary.scheduled_bytes,
            dry_run = self.plan.dry_run,
            "Drain plan ready"
        );

        Ok(PreparedDrain {
            tasks,
            summary,
            filesystems,
        })
    }

    /// Run the prepared plan: readonly guard, then the worker pool over
    /// the task queue. Always returns a report once tasks may have
    /// started; only pre-flight failures surface as errors.
    pub async fn execute(&self, prepared: PreparedDrain) -> Result<DrainReport, DrainError> {
        if self.plan.dry_run {
            // Structural guarantee for the dry-run contract: this path
            // cannot reach any mutating call.
            return Err(DrainError::ConfigurationInvalid(
                "A dry-run plan cannot be executed".to_string(),
            ));
        }

        mark_readonly(self.admin.as_ref(), &self.readonly_targets(&prepared)).await?;

        let queue: Arc<Mutex<VecDeque<DrainTask>>> = Arc::new(Mutex::new(
            prepared.tasks.into_iter().collect::<VecDeque<_>>(),
        ));
        let counters = Arc::new(Mutex::new(RunCounters::default()));
        let ctx = Arc::new(DrainContext {
            catalog: Arc::clone(&self.catalog),
            copy: Arc::clone(&self.copy),
            settings: self.settings.clone(),
            base_hints: self.base_hints(),
            errors: self.errors.clone(),
        });

        let mut workers: JoinSet<()> = JoinSet::new();
        for worker in 0..self.plan.workers {
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&counters);
            let ctx = Arc::clone(&ctx);
            let mut cancel_rx = self.cancel_tx.subscribe();

            workers.spawn(async move {
                loop {
                    if *cancel_rx.borrow() {
                        debug!(worker, "Cancellation observed, stopping");
                        break;
                    }
                    let task = queue.lock().await.pop_front();
                    let Some(task) = task else {
                        debug!(worker, "Queue empty, stopping");
                        break;
                    };

                    info!(
                        worker,
                        lfn = %task.lfn,
                        sfn = %task.record.sfn,
                        "Draining replica"
                    );
                    let outcome = drain_one(&ctx, &task, &mut cancel_rx).await;

                    let mut counters = counters.lock().await;
                    match outcome {
                        TaskOutcome::Drained => counters.drained += 1,
                        TaskOutcome::DeletedDirectly => counters.deleted += 1,
                        TaskOutcome::Skipped(_) => counters.skipped += 1,
                        TaskOutcome::Failed(_) => counters.failed += 1,
                    }
                }
            });
        }

        // Join workers with a bounded wait, then report no matter what.
        let join_timeout = self.settings.worker_join_timeout();
        loop {
            match tokio::time::timeout(join_timeout, workers.join_next()).await {
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(e))) => error!(error = %e, "Worker panicked"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        timeout_secs = self.settings.worker_join_timeout_secs,
                        "Timed out joining workers, abandoning the stragglers"
                    );
                    workers.abort_all();
                    break;
                }
            }
        }

        let counters = *counters.lock().await;
        let report = DrainReport {
            summary: prepared.summary,
            counters,
            errors: self.errors.snapshot().await,
            cancelled: self.is_cancelled(),
        };
        info!(
            drained = counters.drained,
            deleted = counters.deleted,
            skipped = counters.skipped,
            failed = counters.failed,
            cancelled = report.cancelled,
            "Drain run finished"
        );
        Ok(report)
    }

    /// Distinct source filesystems touched by the scheduled tasks, in
    /// encounter order.
    fn readonly_targets(&self, prepared: &PreparedDrain) -> Vec<FsInfo> {
        let mut targets: Vec<FsInfo> = Vec::new();
        for task in &prepared.tasks {
            let record = &task.record;
            if targets
                .iter()
                .any(|f| f.server == record.server && f.name == record.fs)
            {
                continue;
            }
            match prepared
                .filesystems
                .iter()
                .find(|f| f.server == record.server && f.name == record.fs)
            {
                Some(fs) => targets.push(fs.clone()),
                None => {
                    warn!(
                        server = %record.server,
                        fs = %record.fs,
                        "Replica location missing from scope configuration"
                    );
                    targets.push(FsInfo {
                        pool: record.pool.clone(),
                        server: record.server.clone(),
                        name: record.fs.clone(),
                        status: FsStatus::Enabled,
                        weight: 0,
                    });
                }
            }
        }
        targets
    }

    fn base_hints(&self) -> PlacementHints {
        match (&self.plan.scope, &self.plan.move_target) {
            (DrainScope::Folder { .. }, Some(target)) => PlacementHints {
                pool: None,
                filesystem: Some(format!("{}:{}", target.server, target.fs)),
                file_type: target.file_type,
                lifetime_secs: target.lifetime_secs,
                space_token: None,
            },
            _ => PlacementHints::default(),
        }
    }
}
