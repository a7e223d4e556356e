// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Error aggregation and run reporting.
//!
//! One append-only list per run, printed in full at the end whether or
//! not anything failed; an empty table is itself meaningful output.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::{ErrorEntry, TaskErrorKind};

/// The shared, lock-guarded error list workers append to.
#[derive(Clone, Default)]
pub struct ErrorList {
    entries: Arc<Mutex<Vec<ErrorEntry>>>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, entry: ErrorEntry) {
        self.entries.lock().await.push(entry);
    }

    pub async fn snapshot(&self) -> Vec<ErrorEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// What the planner decided, shown before execution (and exclusively,
/// in dry-run mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    /// Replicas matching the scope and group filter
    pub matching_files: usize,
    pub matching_bytes: u64,
    pub size_percent: u8,
    /// Byte budget derived from the percentage
    pub budget_bytes: u64,
    /// Replicas actually scheduled within the budget
    pub scheduled_files: usize,
    pub scheduled_bytes: u64,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total replicas installed in the scope to drain: {}",
            self.matching_files
        )?;
        writeln!(
            f,
            "Total capacity installed in the scope to drain: {} KB",
            self.matching_bytes / 1024
        )?;
        writeln!(
            f,
            "Percentage of capacity to drain: {} %",
            self.size_percent
        )?;
        writeln!(
            f,
            "Total capacity to drain: {} KB",
            self.budget_bytes / 1024
        )?;
        write!(
            f,
            "Replicas scheduled: {} ({} KB)",
            self.scheduled_files,
            self.scheduled_bytes / 1024
        )
    }
}

/// Per-outcome counters maintained while the pool runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub drained: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The consolidated end-of-run report.
#[derive(Debug, Clone)]
pub struct DrainReport {
    pub summary: PlanSummary,
    pub counters: RunCounters,
    pub errors: Vec<ErrorEntry>,
    pub cancelled: bool,
}

impl DrainReport {
    /// True if every scheduled task drained or was directly deleted.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    /// Number of entries with the most severe kind.
    pub fn cleanup_failures(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.kind == TaskErrorKind::CleanupFailed)
            .count()
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cancelled {
            writeln!(f, "Drain process stopped")?;
        } else {
            writeln!(f, "Drain process completed")?;
        }
        writeln!(
            f,
            "Drained: {}  Deleted: {}  Skipped: {}  Failed: {}",
            self.counters.drained, self.counters.deleted, self.counters.skipped,
            self.counters.failed
        )?;

        if self.errors.is_empty() {
            write!(f, "No errors.")?;
            return Ok(());
        }

        writeln!(f, "List of errors:")?;
        for entry in &self.errors {
            writeln!(
                f,
                "File: {}\tsfn: {}\tError: {}",
                entry.lfn, entry.sfn, entry.detail
            )?;
        }
        if self.cleanup_failures() > 0 {
            write!(
                f,
                "{} replica(s) could not be cleaned up and may exist twice; \
                 operator attention required.",
                self.cleanup_failures()
            )?;
        }
        Ok(())
    }
}
