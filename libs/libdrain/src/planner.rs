// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Drain planning: group filtering and the size budget.

use tracing::debug;

use crate::report::PlanSummary;
use crate::types::DrainTask;

/// Apply the group filter and the size budget to the resolved
/// inventory, in resolver order.
///
/// The budget is `matching bytes x percent / 100`; a task is scheduled
/// only if it fits in what remains, and scheduling stops at the first
/// task that would not. Whole-task granularity, never exceeding the
/// budget, under-draining by at most one task.
pub fn plan_tasks(
    candidates: Vec<DrainTask>,
    gid: Option<u32>,
    size_percent: u8,
) -> (Vec<DrainTask>, PlanSummary) {
    let matching: Vec<DrainTask> = candidates
        .into_iter()
        .filter(|t| gid.is_none_or(|g| t.record.gid == g))
        .collect();

    let matching_files = matching.len();
    let matching_bytes: u64 = matching.iter().map(|t| t.record.size_bytes).sum();
    let budget_bytes = (u128::from(matching_bytes) * u128::from(size_percent) / 100) as u64;

    let mut scheduled = Vec::with_capacity(matching.len());
    let mut scheduled_bytes: u64 = 0;
    for task in matching {
        if scheduled_bytes + task.record.size_bytes > budget_bytes {
            debug!(
                lfn = %task.lfn,
                size = task.record.size_bytes,
                remaining = budget_bytes - scheduled_bytes,
                "Budget reached, truncating plan"
            );
            break;
        }
        scheduled_bytes += task.record.size_bytes;
        scheduled.push(task);
    }

    let summary = PlanSummary {
        matching_files,
        matching_bytes,
        size_percent,
        budget_bytes,
        scheduled_files: scheduled.len(),
        scheduled_bytes,
    };

    (scheduled, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReplicaRecord, ReplicaStatus};

    fn task(name: &str, size: u64, gid: u32) -> DrainTask {
        DrainTask {
            record: ReplicaRecord {
                name: name.to_string(),
                pool: "pool01".to_string(),
                server: "disk01.example.org".to_string(),
                fs: "/srv/data01".to_string(),
                sfn: format!("disk01.example.org:/srv/data01/{}", name),
                size_bytes: size,
                gid,
                status: ReplicaStatus::Available,
                pin_expiry: None,
                space_token: None,
            },
            lfn: format!("/dteam/{}", name),
        }
    }

    #[test]
    fn full_size_schedules_everything_exactly() {
        let candidates = vec![task("a", 100, 1), task("b", 250, 1), task("c", 50, 1)];
        let (scheduled, summary) = plan_tasks(candidates, None, 100);

        assert_eq!(scheduled.len(), 3);
        assert_eq!(summary.scheduled_bytes, 400);
        assert_eq!(summary.scheduled_bytes, summary.matching_bytes);
    }

    #[test]
    fn half_of_ten_equal_replicas_is_exactly_five() {
        let mb = 100 * 1024 * 1024;
        let candidates: Vec<DrainTask> =
            (0..10).map(|i| task(&format!("f{}", i), mb, 1)).collect();

        let (scheduled, summary) = plan_tasks(candidates, None, 50);

        assert_eq!(scheduled.len(), 5);
        assert_eq!(summary.scheduled_bytes, 5 * mb);
        assert_eq!(summary.budget_bytes, 5 * mb);
    }

    #[test]
    fn budget_is_never_exceeded_and_next_task_would_exceed_it() {
        // 60 + 60 + 60 = 180 total; 50% -> budget 90. Only the first
        // task fits; the second would push to 120 > 90.
        let candidates = vec![task("a", 60, 1), task("b", 60, 1), task("c", 60, 1)];
        let (scheduled, summary) = plan_tasks(candidates, None, 50);

        assert_eq!(scheduled.len(), 1);
        assert!(summary.scheduled_bytes <= summary.budget_bytes);
        assert!(summary.scheduled_bytes + 60 > summary.budget_bytes);
    }

    #[test]
    fn truncation_stops_at_first_oversized_task() {
        // The big task blocks the walk even though the small one after
        // it would fit: scheduling is first-scheduled-first-counted.
        let candidates = vec![task("a", 40, 1), task("big", 100, 1), task("c", 5, 1)];
        let (scheduled, _) = plan_tasks(candidates, None, 50);

        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].lfn, "/dteam/a");
    }

    #[test]
    fn group_filter_matches_gid_only() {
        let candidates = vec![task("a", 10, 1), task("b", 10, 2), task("c", 10, 1)];
        let (scheduled, summary) = plan_tasks(candidates, Some(1), 100);

        assert_eq!(scheduled.len(), 2);
        assert_eq!(summary.matching_files, 2);
        assert_eq!(summary.matching_bytes, 20);
        assert!(scheduled.iter().all(|t| t.record.gid == 1));
    }

    #[test]
    fn no_group_filter_matches_all() {
        let candidates = vec![task("a", 10, 1), task("b", 10, 2)];
        let (scheduled, _) = plan_tasks(candidates, None, 100);
        assert_eq!(scheduled.len(), 2);
    }

    #[test]
    fn empty_inventory_makes_an_empty_plan() {
        let (scheduled, summary) = plan_tasks(Vec::new(), None, 100);
        assert!(scheduled.is_empty());
        assert_eq!(summary.matching_bytes, 0);
        assert_eq!(summary.budget_bytes, 0);
    }

    #[test]
    fn zero_sized_replicas_all_fit() {
        let candidates = vec![task("a", 0, 1), task("b", 0, 1)];
        let (scheduled, summary) = plan_tasks(candidates, None, 1);
        assert_eq!(scheduled.len(), 2);
        assert_eq!(summary.scheduled_bytes, 0);
    }
}
