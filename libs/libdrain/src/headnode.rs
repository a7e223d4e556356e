// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Head-node REST client.
//!
//! The head node exposes the metadata store, the catalog and the admin
//! control plane as `{base}/command/<name>` endpoints taking JSON
//! bodies. Requests are authenticated with the host certificate; the
//! effective client identity travels in the `remoteclientdn` /
//! `remoteclientaddr` headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Identity, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, CatalogReplica, PlacementHints};
use crate::inventory::{Inventory, InventoryError};
use crate::types::{FsInfo, FsStatus, ReplicaRecord, ReplicaStatus};

/// Head-node request errors.
#[derive(Debug, Error)]
pub enum HeadNodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{command} returned {status}: {detail}")]
    Status {
        command: String,
        status: StatusCode,
        detail: String,
    },

    #[error("{command} returned an unexpected payload: {detail}")]
    BadPayload { command: String, detail: String },
}

impl From<HeadNodeError> for InventoryError {
    fn from(e: HeadNodeError) -> Self {
        match e {
            HeadNodeError::Http(e) => InventoryError::Http(e),
            other => InventoryError::Remote(other.to_string()),
        }
    }
}

impl From<HeadNodeError> for CatalogError {
    fn from(e: HeadNodeError) -> Self {
        match e {
            HeadNodeError::Http(e) => CatalogError::Http(e),
            HeadNodeError::Status { status, command, detail }
                if status == StatusCode::NOT_FOUND =>
            {
                CatalogError::NotFound(format!("{}: {}", command, detail))
            }
            other => CatalogError::Remote(other.to_string()),
        }
    }
}

/// Connection parameters for the head node.
pub struct HeadNodeConfig {
    /// Base URL, e.g. `https://head.example.org:1094/domehead`
    pub base_url: String,
    /// Host certificate/key pair, PEM
    pub identity: Option<Identity>,
    /// DN presented as the effective client
    pub client_dn: Option<String>,
    /// Address presented as the effective client
    pub client_address: Option<String>,
    pub timeout_secs: u64,
}

pub struct HeadNodeClient {
    client: Client,
    base_url: String,
    client_dn: Option<String>,
    client_address: Option<String>,
}

impl HeadNodeClient {
    pub fn new(config: HeadNodeConfig) -> Result<Self, HeadNodeError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(true);
        if let Some(identity) = config.identity {
            builder = builder.identity(identity);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url,
            client_dn: config.client_dn,
            client_address: config.client_address,
        })
    }

    fn command_url(&self, command: &str) -> String {
        build_command_url(&self.base_url, command)
    }

    /// Issue one command. Non-success statuses become errors; lookups
    /// that want 404-as-absent go through `request_optional`.
    async fn request(
        &self,
        verb: Method,
        command: &str,
        body: Value,
    ) -> Result<reqwest::Response, HeadNodeError> {
        match self.request_optional(verb, command, body).await? {
            Some(response) => Ok(response),
            None => Err(HeadNodeError::Status {
                command: command.to_string(),
                status: StatusCode::NOT_FOUND,
                detail: "not found".to_string(),
            }),
        }
    }

    async fn request_optional(
        &self,
        verb: Method,
        command: &str,
        body: Value,
    ) -> Result<Option<reqwest::Response>, HeadNodeError> {
        let mut request = self
            .client
            .request(verb, self.command_url(command))
            .json(&body);
        if let Some(dn) = &self.client_dn {
            request = request.header("remoteclientdn", dn);
        }
        if let Some(addr) = &self.client_address {
            request = request.header("remoteclientaddr", addr);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(HeadNodeError::Status {
                command: command.to_string(),
                status,
                detail,
            });
        }
        Ok(Some(response))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        command: &str,
        body: Value,
    ) -> Result<T, HeadNodeError> {
        let response = self.request(Method::GET, command, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HeadNodeError::BadPayload {
                command: command.to_string(),
                detail: e.to_string(),
            })
    }

    /// Fire-and-check POST command used by mutations.
    pub(crate) async fn post_command(
        &self,
        command: &str,
        body: Value,
    ) -> Result<(), HeadNodeError> {
        self.request(Method::POST, command, body).await?;
        Ok(())
    }
}

fn build_command_url(base_url: &str, command: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{}/command/{}", base, command)
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpaceInfoResponse {
    poolinfo: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
struct PoolEntry {
    poolname: String,
}

#[derive(Debug, Deserialize)]
struct StatPoolResponse {
    fsinfo: Vec<FsEntry>,
}

#[derive(Debug, Deserialize)]
struct FsEntry {
    poolname: String,
    server: String,
    fsname: String,
    status: u8,
    #[serde(default)]
    weight: i32,
}

impl FsEntry {
    fn into_fs_info(self, command: &str) -> Result<FsInfo, HeadNodeError> {
        let status = FsStatus::from_code(self.status).ok_or_else(|| HeadNodeError::BadPayload {
            command: command.to_string(),
            detail: format!("unknown filesystem status code {}", self.status),
        })?;
        Ok(FsInfo {
            pool: self.poolname,
            server: self.server,
            name: self.fsname,
            status,
            weight: self.weight,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ReplicasResponse {
    replicas: Vec<ReplicaEntry>,
}

#[derive(Debug, Deserialize)]
struct ReplicaEntry {
    name: String,
    poolname: String,
    server: String,
    fsname: String,
    sfn: String,
    size: u64,
    gid: u32,
    status: String,
    /// Pin expiry, seconds since the epoch; 0 or absent means no pin
    #[serde(default)]
    pintime: i64,
    #[serde(default)]
    setname: String,
}

impl ReplicaEntry {
    fn into_record(self, command: &str) -> Result<ReplicaRecord, HeadNodeError> {
        let status_code = self.status.chars().next().unwrap_or('-');
        let status =
            ReplicaStatus::from_code(status_code).ok_or_else(|| HeadNodeError::BadPayload {
                command: command.to_string(),
                detail: format!("unknown replica status code {:?}", self.status),
            })?;
        let pin_expiry = if self.pintime > 0 {
            chrono::DateTime::from_timestamp(self.pintime, 0)
        } else {
            None
        };
        Ok(ReplicaRecord {
            name: self.name,
            pool: self.poolname,
            server: self.server,
            fs: self.fsname,
            sfn: self.sfn,
            size_bytes: self.size,
            gid: self.gid,
            status,
            pin_expiry,
            space_token: if self.setname.is_empty() {
                None
            } else {
                Some(self.setname)
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    gid: u32,
}

#[derive(Debug, Deserialize)]
struct LfnResponse {
    lfn: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    host: String,
    pfn: String,
}

#[derive(Debug, Deserialize)]
struct ReplicaInfoResponse {
    rfn: String,
    status: String,
    poolname: String,
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl HeadNodeClient {
    async fn fetch_replicas(&self, body: Value) -> Result<Vec<ReplicaRecord>, InventoryError> {
        let response: ReplicasResponse = self.get_json("dome_getreplicas", body).await?;
        response
            .replicas
            .into_iter()
            .map(|r| r.into_record("dome_getreplicas").map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl Inventory for HeadNodeClient {
    async fn pools(&self) -> Result<Vec<String>, InventoryError> {
        let response: SpaceInfoResponse = self.get_json("dome_getspaceinfo", json!({})).await?;
        Ok(response.poolinfo.into_iter().map(|p| p.poolname).collect())
    }

    async fn filesystems(&self, pool: &str) -> Result<Vec<FsInfo>, InventoryError> {
        let response: StatPoolResponse = self
            .get_json("dome_statpool", json!({ "poolname": pool }))
            .await?;
        response
            .fsinfo
            .into_iter()
            .map(|f| f.into_fs_info("dome_statpool").map_err(Into::into))
            .collect()
    }

    async fn replicas_in_pool(&self, pool: &str) -> Result<Vec<ReplicaRecord>, InventoryError> {
        self.fetch_replicas(json!({ "poolname": pool })).await
    }

    async fn replicas_in_filesystem(
        &self,
        server: &str,
        fs: &str,
    ) -> Result<Vec<ReplicaRecord>, InventoryError> {
        self.fetch_replicas(json!({ "server": server, "fsname": fs }))
            .await
    }

    async fn replicas_in_server(
        &self,
        server: &str,
    ) -> Result<Vec<ReplicaRecord>, InventoryError> {
        self.fetch_replicas(json!({ "server": server })).await
    }

    async fn replicas_in_folder(
        &self,
        server: &str,
        fs: &str,
        folder: &str,
    ) -> Result<Vec<ReplicaRecord>, InventoryError> {
        self.fetch_replicas(json!({ "server": server, "fsname": fs, "folder": folder }))
            .await
    }

    async fn group_id(&self, name: &str) -> Result<Option<u32>, InventoryError> {
        let response = self
            .request_optional(Method::GET, "dome_getgroup", json!({ "groupname": name }))
            .await?;
        match response {
            None => Ok(None),
            Some(r) => {
                let group: GroupResponse =
                    r.json().await.map_err(|e| HeadNodeError::BadPayload {
                        command: "dome_getgroup".to_string(),
                        detail: e.to_string(),
                    })?;
                Ok(Some(group.gid))
            }
        }
    }

    async fn lfn_of(&self, sfn: &str) -> Result<Option<String>, InventoryError> {
        let response = self
            .request_optional(Method::GET, "dome_getlfn", json!({ "rfn": sfn }))
            .await?;
        match response {
            None => Ok(None),
            Some(r) => {
                let lfn: LfnResponse = r.json().await.map_err(|e| HeadNodeError::BadPayload {
                    command: "dome_getlfn".to_string(),
                    detail: e.to_string(),
                })?;
                Ok(Some(lfn.lfn))
            }
        }
    }
}

#[async_trait]
impl Catalog for HeadNodeClient {
    async fn where_to_write(
        &self,
        lfn: &str,
        hints: &PlacementHints,
    ) -> Result<String, CatalogError> {
        let mut body = json!({ "lfn": lfn, "additionalreplica": "true" });
        if let Some(pool) = &hints.pool {
            body["pool"] = json!(pool);
        }
        if let Some(fs) = &hints.filesystem {
            body["fs"] = json!(fs);
        }
        if let Some(ft) = hints.file_type {
            body["filetype"] = json!(ft.to_string());
        }
        if let Some(lifetime) = hints.lifetime_secs {
            body["lifetime"] = json!(lifetime);
        }
        if let Some(token) = &hints.space_token {
            body["spacetoken"] = json!(token);
        }

        let response: PutResponse = self.get_json("dome_put", body).await?;
        Ok(format!("{}:{}", response.host, response.pfn))
    }

    async fn replica_by_rfn(&self, rfn: &str) -> Result<CatalogReplica, CatalogError> {
        let response = self
            .request_optional(Method::GET, "dome_getreplicainfo", json!({ "rfn": rfn }))
            .await
            .map_err(CatalogError::from)?;
        let Some(response) = response else {
            return Err(CatalogError::NotFound(rfn.to_string()));
        };
        let info: ReplicaInfoResponse =
            response.json().await.map_err(|e| HeadNodeError::BadPayload {
                command: "dome_getreplicainfo".to_string(),
                detail: e.to_string(),
            })?;
        let status_code = info.status.chars().next().unwrap_or('-');
        let status = ReplicaStatus::from_code(status_code).ok_or_else(|| {
            CatalogError::Remote(format!("unknown replica status code {:?}", info.status))
        })?;
        Ok(CatalogReplica {
            rfn: info.rfn,
            status,
            pool: info.poolname,
        })
    }

    async fn unlink(&self, lfn: &str) -> Result<(), CatalogError> {
        self.post_command("dome_unlink", json!({ "lfn": lfn }))
            .await
            .map_err(Into::into)
    }

    async fn delete_replica(&self, rfn: &str) -> Result<(), CatalogError> {
        self.post_command("dome_delreplica", json!({ "rfn": rfn }))
            .await
            .map_err(Into::into)
    }

    async fn remove_replica(&self, replica: &CatalogReplica) -> Result<(), CatalogError> {
        self.post_command(
            "dome_pfnrm",
            json!({ "rfn": replica.rfn, "poolname": replica.pool }),
        )
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_url_trims_trailing_slashes() {
        assert_eq!(
            build_command_url("https://head:1094/domehead///", "dome_statpool"),
            "https://head:1094/domehead/command/dome_statpool"
        );
        assert_eq!(
            build_command_url("https://head:1094/domehead", "dome_put"),
            "https://head:1094/domehead/command/dome_put"
        );
    }

    #[test]
    fn replica_entry_maps_to_record() {
        let entry: ReplicaEntry = serde_json::from_value(json!({
            "name": "file1",
            "poolname": "pool01",
            "server": "disk01.example.org",
            "fsname": "/srv/data01",
            "sfn": "disk01.example.org:/srv/data01/dteam/file1",
            "size": 2048,
            "gid": 105,
            "status": "P",
            "pintime": 0,
            "setname": "DTEAMDISK"
        }))
        .unwrap();

        let record = entry.into_record("dome_getreplicas").unwrap();
        assert_eq!(record.status, ReplicaStatus::UnderPopulation);
        assert_eq!(record.size_bytes, 2048);
        assert_eq!(record.space_token.as_deref(), Some("DTEAMDISK"));
        assert!(record.pin_expiry.is_none());
    }

    #[test]
    fn replica_entry_rejects_unknown_status() {
        let entry: ReplicaEntry = serde_json::from_value(json!({
            "name": "file1",
            "poolname": "pool01",
            "server": "disk01.example.org",
            "fsname": "/srv/data01",
            "sfn": "disk01.example.org:/srv/data01/dteam/file1",
            "size": 2048,
            "gid": 105,
            "status": "Z"
        }))
        .unwrap();

        assert!(entry.into_record("dome_getreplicas").is_err());
    }

    #[test]
    fn replica_entry_pin_expiry_from_epoch() {
        let entry: ReplicaEntry = serde_json::from_value(json!({
            "name": "file1",
            "poolname": "pool01",
            "server": "disk01.example.org",
            "fsname": "/srv/data01",
            "sfn": "disk01.example.org:/srv/data01/dteam/file1",
            "size": 1,
            "gid": 0,
            "status": "-",
            "pintime": 4102444800i64
        }))
        .unwrap();

        let record = entry.into_record("dome_getreplicas").unwrap();
        assert!(record.pin_expiry.is_some());
    }

    #[test]
    fn fs_entry_rejects_unknown_status_code() {
        let entry: FsEntry = serde_json::from_value(json!({
            "poolname": "pool01",
            "server": "disk01.example.org",
            "fsname": "/srv/data01",
            "status": 9
        }))
        .unwrap();

        assert!(entry.into_fs_info("dome_statpool").is_err());
    }
}
