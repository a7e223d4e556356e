// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Catalog and placement seam.
//!
//! The file catalog and the pool-placement logic are external services;
//! the drain operation only needs the handful of calls below.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ReplicaStatus;

/// Catalog/placement call errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    Remote(String),
}

/// Constraints handed to the placement service when asking for a
/// destination. All fields optional; an empty set of hints means
/// "anywhere with capacity".
#[derive(Debug, Clone, Default)]
pub struct PlacementHints {
    /// Target pool
    pub pool: Option<String>,
    /// Target filesystem, `server:fs`
    pub filesystem: Option<String>,
    /// Replica file type: P, V or D
    pub file_type: Option<char>,
    /// Replica lifetime in seconds
    pub lifetime_secs: Option<i64>,
    /// Space token the new replica is accounted against
    pub space_token: Option<String>,
}

/// A replica as the catalog sees it, fetched by physical name.
#[derive(Debug, Clone)]
pub struct CatalogReplica {
    pub rfn: String,
    pub status: ReplicaStatus,
    pub pool: String,
}

/// The catalog/placement operations the drain needs.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Ask the placement service where a new copy of `lfn` should be
    /// written. Returns the destination location, `host:/path[?args]`.
    async fn where_to_write(
        &self,
        lfn: &str,
        hints: &PlacementHints,
    ) -> Result<String, CatalogError>;

    /// Fetch a replica's catalog entry by physical name.
    async fn replica_by_rfn(&self, rfn: &str) -> Result<CatalogReplica, CatalogError>;

    /// Remove the logical file entry entirely (to-be-deleted files).
    async fn unlink(&self, lfn: &str) -> Result<(), CatalogError>;

    /// Remove a replica's catalog row. Best-effort after a physical
    /// removal; the pool driver may already have cleaned it.
    async fn delete_replica(&self, rfn: &str) -> Result<(), CatalogError>;

    /// Physically remove a replica through its pool driver.
    async fn remove_replica(&self, replica: &CatalogReplica) -> Result<(), CatalogError>;
}
