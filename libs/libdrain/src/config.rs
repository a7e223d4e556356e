// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Drain plan and transport settings.

use std::time::Duration;

use serde::Deserialize;

use crate::error::DrainError;
use crate::types::DrainScope;

/// Replica attributes applied when a move targets a specific filesystem.
#[derive(Debug, Clone, Default)]
pub struct MoveTarget {
    /// Destination disk server
    pub server: String,
    /// Destination filesystem on that server
    pub fs: String,
    /// Replica file type: P (permanent), V (volatile) or D (durable)
    pub file_type: Option<char>,
    /// Replica lifetime in seconds; `None` leaves the catalog default
    pub lifetime_secs: Option<i64>,
}

/// Everything one drain run needs to decide what to do.
///
/// Constructed once, validated, then shared read-only across workers.
#[derive(Debug, Clone)]
pub struct DrainPlan {
    pub scope: DrainScope,
    /// Restrict to replicas owned by this group; `None` matches all groups
    pub group: Option<String>,
    /// Percentage of the scope's bytes to drain, 1-100
    pub size_percent: u8,
    /// Worker count, 1-10
    pub workers: usize,
    /// Plan and report only; no mutating calls of any kind
    pub dry_run: bool,
    /// Required when the scope is a folder move, forbidden otherwise
    pub move_target: Option<MoveTarget>,
}

impl DrainPlan {
    /// A plan for the given scope with the historical defaults: all
    /// groups, the full size, five workers, dry-run on.
    pub fn new(scope: DrainScope) -> Self {
        Self {
            scope,
            group: None,
            size_percent: 100,
            workers: 5,
            dry_run: true,
            move_target: None,
        }
    }

    /// Reject out-of-range or inconsistent parameters before anything
    /// touches the network.
    pub fn validate(&self) -> Result<(), DrainError> {
        if self.size_percent < 1 || self.size_percent > 100 {
            return Err(DrainError::ConfigurationInvalid(format!(
                "Incorrect drain size {}: it must be between 1 and 100",
                self.size_percent
            )));
        }
        if self.workers < 1 || self.workers > 10 {
            return Err(DrainError::ConfigurationInvalid(format!(
                "Incorrect number of workers {}: it must be between 1 and 10",
                self.workers
            )));
        }
        if let Some(target) = &self.move_target {
            if !matches!(self.scope, DrainScope::Folder { .. }) {
                return Err(DrainError::ConfigurationInvalid(
                    "A move target only applies to a folder scope".to_string(),
                ));
            }
            if let Some(ft) = target.file_type {
                if !matches!(ft, 'P' | 'V' | 'D') {
                    return Err(DrainError::ConfigurationInvalid(format!(
                        "Incorrect file type {}: it should be P (permanent), V (volatile) or D (durable)",
                        ft
                    )));
                }
            }
        } else if matches!(self.scope, DrainScope::Folder { .. }) {
            return Err(DrainError::ConfigurationInvalid(
                "A folder scope requires a move target".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transport and retry knobs, fixed for the lifetime of a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrainSettings {
    /// Secure port of the source endpoints the COPY is issued against
    pub https_port: u16,
    /// Plain port rewritten into the `Destination` header
    pub http_port: u16,
    /// Attempts for the final removal call before declaring cleanup failed
    pub removal_attempts: u32,
    /// Pause between removal attempts (seconds)
    pub removal_backoff_secs: u64,
    /// Bound on waiting for each worker to join after cancellation (seconds)
    pub worker_join_timeout_secs: u64,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            https_port: 443,
            http_port: 80,
            removal_attempts: 3,
            removal_backoff_secs: 1,
            worker_join_timeout_secs: 10,
        }
    }
}

impl DrainSettings {
    pub fn removal_backoff(&self) -> Duration {
        Duration::from_secs(self.removal_backoff_secs)
    }

    pub fn worker_join_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_join_timeout_secs)
    }
}

/// Parse a replica lifetime: `Inf`, or a number suffixed with `y`, `m`,
/// `d` or `h`, or a bare number of seconds.
pub fn parse_lifetime(s: &str) -> Result<i64, DrainError> {
    const INF: i64 = 0x7FFF_FFFF;

    if s == "Inf" {
        return Ok(INF);
    }
    let (digits, multiplier) = match s.chars().last() {
        Some('y') => (&s[..s.len() - 1], 365 * 86_400),
        Some('m') => (&s[..s.len() - 1], 30 * 86_400),
        Some('d') => (&s[..s.len() - 1], 86_400),
        Some('h') => (&s[..s.len() - 1], 3_600),
        _ => (s, 1),
    };
    digits
        .parse::<i64>()
        .map(|n| n * multiplier)
        .map_err(|_| DrainError::ConfigurationInvalid(format!("Invalid lifetime: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_plan() -> DrainPlan {
        DrainPlan::new(DrainScope::Pool {
            name: "pool01".to_string(),
        })
    }

    #[test]
    fn defaults_match_historical_behavior() {
        let plan = pool_plan();
        assert_eq!(plan.size_percent, 100);
        assert_eq!(plan.workers, 5);
        assert!(plan.dry_run);
        assert!(plan.group.is_none());
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn size_out_of_range_is_rejected() {
        let mut plan = pool_plan();
        plan.size_percent = 0;
        assert!(plan.validate().is_err());
        plan.size_percent = 101;
        assert!(plan.validate().is_err());
        plan.size_percent = 1;
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn workers_out_of_range_is_rejected() {
        let mut plan = pool_plan();
        plan.workers = 0;
        assert!(plan.validate().is_err());
        plan.workers = 11;
        assert!(plan.validate().is_err());
        plan.workers = 10;
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn folder_scope_requires_move_target() {
        let mut plan = DrainPlan::new(DrainScope::Folder {
            server: "disk01".to_string(),
            fs: "/srv/data01".to_string(),
            folder: "/dteam/2015-11-25".to_string(),
        });
        assert!(plan.validate().is_err());

        plan.move_target = Some(MoveTarget {
            server: "disk02".to_string(),
            fs: "/srv/data01".to_string(),
            file_type: None,
            lifetime_secs: None,
        });
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn move_target_on_pool_scope_is_rejected() {
        let mut plan = pool_plan();
        plan.move_target = Some(MoveTarget::default());
        assert!(plan.validate().is_err());
    }

    #[test]
    fn bad_file_type_is_rejected() {
        let mut plan = DrainPlan::new(DrainScope::Folder {
            server: "disk01".to_string(),
            fs: "/srv/data01".to_string(),
            folder: "/dteam".to_string(),
        });
        plan.move_target = Some(MoveTarget {
            server: "disk02".to_string(),
            fs: "/srv/data01".to_string(),
            file_type: Some('X'),
            lifetime_secs: None,
        });
        assert!(plan.validate().is_err());
    }

    #[test]
    fn lifetime_parsing() {
        assert_eq!(parse_lifetime("Inf").unwrap(), 0x7FFF_FFFF);
        assert_eq!(parse_lifetime("2y").unwrap(), 2 * 365 * 86_400);
        assert_eq!(parse_lifetime("3m").unwrap(), 3 * 30 * 86_400);
        assert_eq!(parse_lifetime("10d").unwrap(), 10 * 86_400);
        assert_eq!(parse_lifetime("6h").unwrap(), 6 * 3_600);
        assert_eq!(parse_lifetime("120").unwrap(), 120);
        assert!(parse_lifetime("tenh").is_err());
        assert!(parse_lifetime("").is_err());
    }

    #[test]
    fn settings_defaults() {
        let settings = DrainSettings::default();
        assert_eq!(settings.https_port, 443);
        assert_eq!(settings.http_port, 80);
        assert_eq!(settings.removal_attempts, 3);
        assert_eq!(settings.worker_join_timeout(), Duration::from_secs(10));
    }
}
