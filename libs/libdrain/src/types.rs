// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Core types shared across the drain orchestrator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog status of a physical replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    /// Replica is fully written and serving reads
    #[default]
    Available,
    /// Replica is still being written by another transfer
    UnderPopulation,
    /// File is marked for deletion; only catalog cleanup remains
    ToBeDeleted,
}

impl ReplicaStatus {
    /// Single-character wire code used by the catalog ("-", "P", "D").
    pub fn code(&self) -> char {
        match self {
            Self::Available => '-',
            Self::UnderPopulation => 'P',
            Self::ToBeDeleted => 'D',
        }
    }

    /// Parse the catalog's single-character status code.
    pub fn from_code(c: char) -> Option<Self> {
        match c {
            '-' => Some(Self::Available),
            'P' => Some(Self::UnderPopulation),
            'D' => Some(Self::ToBeDeleted),
            _ => None,
        }
    }
}

impl fmt::Display for ReplicaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::UnderPopulation => write!(f, "under_population"),
            Self::ToBeDeleted => write!(f, "to_be_deleted"),
        }
    }
}

impl FromStr for ReplicaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "under_population" => Ok(Self::UnderPopulation),
            "to_be_deleted" => Ok(Self::ToBeDeleted),
            _ => Err(format!("Unknown replica status: {}", s)),
        }
    }
}

/// Administrative status of a filesystem within a pool.
///
/// The numeric codes are the control-plane wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsStatus {
    Enabled,
    Disabled,
    ReadOnly,
}

impl FsStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Enabled => 0,
            Self::Disabled => 1,
            Self::ReadOnly => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Enabled),
            1 => Some(Self::Disabled),
            2 => Some(Self::ReadOnly),
            _ => None,
        }
    }
}

impl fmt::Display for FsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::ReadOnly => write!(f, "readonly"),
        }
    }
}

/// One physical copy of a logical file, as read from the metadata store.
///
/// Immutable snapshot: the orchestrator never mutates these, it only
/// decides what to do with them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Catalog base name of the file
    pub name: String,
    /// Pool the replica currently lives in
    pub pool: String,
    /// Disk server hosting the replica
    pub server: String,
    /// Filesystem on that server
    pub fs: String,
    /// Physical file name, `host:/path`
    pub sfn: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Owning group id
    pub gid: u32,
    #[serde(default)]
    pub status: ReplicaStatus,
    /// Pin hold; the replica must not be removed before this passes
    #[serde(default)]
    pub pin_expiry: Option<DateTime<Utc>>,
    /// Quota-scope (space token) the replica is accounted against
    #[serde(default)]
    pub space_token: Option<String>,
}

impl ReplicaRecord {
    /// True if a pin is still in force at `now`.
    pub fn is_pinned(&self, now: DateTime<Utc>) -> bool {
        self.pin_expiry.is_some_and(|t| t > now)
    }
}

/// A filesystem entry from the pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsInfo {
    pub pool: String,
    pub server: String,
    pub name: String,
    pub status: FsStatus,
    /// Placement weight, preserved verbatim when toggling status
    pub weight: i32,
}

impl FsInfo {
    /// Short human-readable location, `server:fs`.
    pub fn location(&self) -> String {
        format!("{}:{}", self.server, self.name)
    }
}

/// The storage scope being emptied. Resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainScope {
    Pool { name: String },
    Filesystem { server: String, fs: String },
    Server { name: String },
    Folder { server: String, fs: String, folder: String },
}

impl fmt::Display for DrainScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool { name } => write!(f, "pool {}", name),
            Self::Filesystem { server, fs } => write!(f, "filesystem {}:{}", server, fs),
            Self::Server { name } => write!(f, "server {}", name),
            Self::Folder { server, fs, folder } => {
                write!(f, "folder {} on {}:{}", folder, server, fs)
            }
        }
    }
}

/// One unit of work: a replica plus its resolved logical name.
///
/// Consumed exactly once by exactly one worker.
#[derive(Debug, Clone)]
pub struct DrainTask {
    pub record: ReplicaRecord,
    pub lfn: String,
}

/// Classification of a recorded per-task error.
///
/// `CleanupFailed` is the most severe kind: the removal of either the
/// original or the new copy did not go through, so two physical copies
/// may coexist until an operator reconciles them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    UnderPopulation,
    Pinned,
    ReplicationFailed,
    VerificationFailed,
    CleanupFailed,
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderPopulation => write!(f, "under_population"),
            Self::Pinned => write!(f, "pinned"),
            Self::ReplicationFailed => write!(f, "replication_failed"),
            Self::VerificationFailed => write!(f, "verification_failed"),
            Self::CleanupFailed => write!(f, "cleanup_failed"),
        }
    }
}

impl FromStr for TaskErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "under_population" => Ok(Self::UnderPopulation),
            "pinned" => Ok(Self::Pinned),
            "replication_failed" => Ok(Self::ReplicationFailed),
            "verification_failed" => Ok(Self::VerificationFailed),
            "cleanup_failed" => Ok(Self::CleanupFailed),
            _ => Err(format!("Unknown task error kind: {}", s)),
        }
    }
}

/// One row of the consolidated error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub lfn: String,
    pub sfn: String,
    pub kind: TaskErrorKind,
    pub detail: String,
}

/// Terminal outcome of one per-replica drain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Replicated, verified, original removed
    Drained,
    /// File was to-be-deleted; only the catalog entry was removed
    DeletedDirectly,
    /// Pre-checks refused the task (under population or pinned)
    Skipped(TaskErrorKind),
    /// The operation failed; the error list has the entry
    Failed(TaskErrorKind),
}
