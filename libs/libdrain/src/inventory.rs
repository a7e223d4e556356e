// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Inventory resolution: querying the metadata store for the replicas
//! in a scope and vetting the scope before anything runs.
//!
//! The metadata store itself is an external collaborator behind the
//! [`Inventory`] trait; the production implementation is the head-node
//! client in `headnode.rs`.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DrainPlan;
use crate::error::DrainError;
use crate::types::{DrainScope, DrainTask, FsInfo, FsStatus, ReplicaRecord};

/// Metadata-store query errors.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metadata store error: {0}")]
    Remote(String),
}

/// Read-only view of the metadata store.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Names of all configured pools.
    async fn pools(&self) -> Result<Vec<String>, InventoryError>;

    /// Filesystems belonging to a pool.
    async fn filesystems(&self, pool: &str) -> Result<Vec<FsInfo>, InventoryError>;

    async fn replicas_in_pool(&self, pool: &str) -> Result<Vec<ReplicaRecord>, InventoryError>;

    async fn replicas_in_filesystem(
        &self,
        server: &str,
        fs: &str,
    ) -> Result<Vec<ReplicaRecord>, InventoryError>;

    async fn replicas_in_server(&self, server: &str)
    -> Result<Vec<ReplicaRecord>, InventoryError>;

    async fn replicas_in_folder(
        &self,
        server: &str,
        fs: &str,
        folder: &str,
    ) -> Result<Vec<ReplicaRecord>, InventoryError>;

    /// Group id for a group name; `None` if the group is unknown.
    async fn group_id(&self, name: &str) -> Result<Option<u32>, InventoryError>;

    /// Logical file name for a physical one; `None` for orphaned copies.
    async fn lfn_of(&self, sfn: &str) -> Result<Option<String>, InventoryError>;
}

/// Result of scope resolution: the candidate work plus the scope's
/// filesystem configuration (needed later by the readonly guard).
#[derive(Debug)]
pub struct ResolvedScope {
    pub tasks: Vec<DrainTask>,
    pub filesystems: Vec<FsInfo>,
}

/// Vet the scope and pull its replicas, resolving physical names to
/// logical ones.
///
/// Fatal outcomes: an unknown scope, or a scope with nowhere left to
/// drain into. Replicas whose logical name does not resolve (orphaned
/// physical copies) are dropped with a warning.
pub async fn resolve_scope(
    inventory: &dyn Inventory,
    plan: &DrainPlan,
) -> Result<ResolvedScope, DrainError> {
    let (records, filesystems) = match &plan.scope {
        DrainScope::Pool { name } => {
            let pools = inventory.pools().await?;
            if !pools.iter().any(|p| p == name) {
                return Err(DrainError::ScopeNotFound(format!(
                    "The pool to drain has not been found in the configuration: {}",
                    name
                )));
            }
            if !pools.iter().any(|p| p != name) {
                return Err(DrainError::NoAlternateCapacity(
                    "There is no other pool available for draining".to_string(),
                ));
            }
            let filesystems = inventory.filesystems(name).await?;
            let records = inventory.replicas_in_pool(name).await?;
            (records, filesystems)
        }

        DrainScope::Filesystem { server, fs } => {
            let all = all_filesystems(inventory).await?;
            let Some(target) = all
                .iter()
                .find(|f| &f.server == server && &f.name == fs)
                .cloned()
            else {
                return Err(DrainError::ScopeNotFound(format!(
                    "The filesystem to drain has not been found in the configuration: {}:{}",
                    server, fs
                )));
            };
            let alternate = all
                .iter()
                .any(|f| !(f.server == target.server && f.name == target.name)
                    && f.status == FsStatus::Enabled);
            if !alternate {
                return Err(DrainError::NoAlternateCapacity(
                    "There are no other available filesystems for draining".to_string(),
                ));
            }
            let records = inventory.replicas_in_filesystem(server, fs).await?;
            (records, vec![target])
        }

        DrainScope::Server { name } => {
            let all = all_filesystems(inventory).await?;
            let on_server: Vec<FsInfo> =
                all.iter().filter(|f| &f.server == name).cloned().collect();
            if on_server.is_empty() {
                return Err(DrainError::ScopeNotFound(format!(
                    "The server to drain has not been found in the configuration: {}",
                    name
                )));
            }
            let alternate = all
                .iter()
                .any(|f| &f.server != name && f.status == FsStatus::Enabled);
            if !alternate {
                return Err(DrainError::NoAlternateCapacity(
                    "There are no filesystems available on other disk servers for draining"
                        .to_string(),
                ));
            }
            let records = inventory.replicas_in_server(name).await?;
            (records, on_server)
        }

        DrainScope::Folder { server, fs, folder } => {
            let all = all_filesystems(inventory).await?;
            let Some(source) = all
                .iter()
                .find(|f| &f.server == server && &f.name == fs)
                .cloned()
            else {
                return Err(DrainError::ScopeNotFound(format!(
                    "The source filesystem has not been found in the configuration: {}:{}",
                    server, fs
                )));
            };
            // The move target was validated to exist by DrainPlan::validate;
            // here it must also exist in the configuration and accept writes.
            if let Some(target) = &plan.move_target {
                let writable = all.iter().any(|f| {
                    f.server == target.server
                        && f.name == target.fs
                        && f.status == FsStatus::Enabled
                });
                if !writable {
                    return Err(DrainError::NoAlternateCapacity(format!(
                        "The destination filesystem has not been found in the configuration \
                         or it is not available for writing: {}:{}",
                        target.server, target.fs
                    )));
                }
            }
            let records = inventory.replicas_in_folder(server, fs, folder).await?;
            (records, vec![source])
        }
    };

    let tasks = resolve_logical_names(inventory, records).await?;
    info!(
        scope = %plan.scope,
        candidates = tasks.len(),
        "Resolved drain scope"
    );

    Ok(ResolvedScope { tasks, filesystems })
}

async fn all_filesystems(inventory: &dyn Inventory) -> Result<Vec<FsInfo>, InventoryError> {
    let mut all = Vec::new();
    for pool in inventory.pools().await? {
        all.extend(inventory.filesystems(&pool).await?);
    }
    Ok(all)
}

async fn resolve_logical_names(
    inventory: &dyn Inventory,
    records: Vec<ReplicaRecord>,
) -> Result<Vec<DrainTask>, InventoryError> {
    let mut tasks = Vec::with_capacity(records.len());
    for record in records {
        match inventory.lfn_of(&record.sfn).await? {
            Some(lfn) => tasks.push(DrainTask { record, lfn }),
            None => {
                warn!(
                    sfn = %record.sfn,
                    "Dropping orphaned replica with no logical name"
                );
            }
        }
    }
    Ok(tasks)
}
