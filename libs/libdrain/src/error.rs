// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Fatal error taxonomy for the drain orchestrator.
//!
//! These abort the whole run before any task is scheduled. Per-task
//! failures are never surfaced through this type; they land in the
//! session's error list instead.

use thiserror::Error;

use crate::admin::AdminError;
use crate::inventory::InventoryError;

/// Errors that abort a drain run during pre-flight.
#[derive(Debug, Error)]
pub enum DrainError {
    /// The named pool/filesystem/server/folder does not exist
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    /// Nothing left to drain into
    #[error("No alternate capacity: {0}")]
    NoAlternateCapacity(String),

    /// Plan or settings rejected before anything ran
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// The metadata store could not be queried
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Marking a source filesystem read-only failed; proceeding would
    /// let new writes land on storage mid-drain
    #[error("Readonly guard failed: {0}")]
    ReadonlyGuard(#[from] AdminError),
}
