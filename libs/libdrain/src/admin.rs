// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Admin control plane: flipping filesystems read-only before a drain.
//!
//! Two interchangeable backends exist, selected once at session setup:
//! the REST head-node admin API and the legacy control-plane daemon's
//! line-oriented RPC. No per-call probing.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::info;

use crate::headnode::HeadNodeClient;
use crate::types::{FsInfo, FsStatus};

/// Control-plane call errors.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Control plane I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not possible to set filesystem {location} to {status}: {detail}")]
    Rejected {
        location: String,
        status: FsStatus,
        detail: String,
    },
}

/// One admin operation is all the drain needs.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// Idempotently set a filesystem's administrative status, preserving
    /// its placement weight.
    async fn set_fs_status(&self, fs: &FsInfo, status: FsStatus) -> Result<(), AdminError>;
}

/// REST backend: the head-node admin API.
pub struct DomeAdmin {
    head: HeadNodeClient,
}

impl DomeAdmin {
    pub fn new(head: HeadNodeClient) -> Self {
        Self { head }
    }
}

#[async_trait]
impl AdminBackend for DomeAdmin {
    async fn set_fs_status(&self, fs: &FsInfo, status: FsStatus) -> Result<(), AdminError> {
        let body = json!({
            "poolname": fs.pool,
            "server": fs.server,
            "fsname": fs.name,
            "status": status.code(),
        });
        self.head
            .post_command("dome_modifyfs", body)
            .await
            .map_err(|e| AdminError::Rejected {
                location: fs.location(),
                status,
                detail: e.to_string(),
            })?;
        Ok(())
    }
}

/// Legacy backend: the old control-plane daemon's TCP RPC.
///
/// Wire format is one request line, one reply line:
/// `MODIFYFS <server> <fs> <status> <weight>` -> `OK` | `ERR <detail>`.
pub struct LegacyAdmin {
    addr: String,
    timeout: Duration,
}

impl LegacyAdmin {
    pub fn new(addr: String, timeout_secs: u64) -> Self {
        Self {
            addr,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn exchange(&self, request: &str) -> Result<String, AdminError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")
            })??;

        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(request.as_bytes()).await?;
        write_half.write_all(b"\n").await?;

        let mut reply = String::new();
        let mut reader = BufReader::new(read_half);
        tokio::time::timeout(self.timeout, reader.read_line(&mut reply))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "reply timed out"))??;

        Ok(reply.trim_end().to_string())
    }
}

#[async_trait]
impl AdminBackend for LegacyAdmin {
    async fn set_fs_status(&self, fs: &FsInfo, status: FsStatus) -> Result<(), AdminError> {
        let request = format!(
            "MODIFYFS {} {} {} {}",
            fs.server,
            fs.name,
            status.code(),
            fs.weight
        );
        let reply = self.exchange(&request).await?;

        if reply == "OK" || reply.starts_with("OK ") {
            Ok(())
        } else {
            Err(AdminError::Rejected {
                location: fs.location(),
                status,
                detail: reply,
            })
        }
    }
}

/// Readonly guard: one idempotent call per distinct source filesystem.
/// Any failure is fatal for the run; proceeding would let new writes
/// land on storage mid-drain.
pub async fn mark_readonly(
    admin: &dyn AdminBackend,
    filesystems: &[FsInfo],
) -> Result<(), AdminError> {
    for fs in filesystems {
        admin.set_fs_status(fs, FsStatus::ReadOnly).await?;
        info!(location = %fs.location(), "Source filesystem set read-only");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn one_shot_server(reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).starts_with("MODIFYFS "));
            socket.write_all(reply.as_bytes()).await.unwrap();
        });
        addr
    }

    fn fs_info() -> FsInfo {
        FsInfo {
            pool: "pool01".to_string(),
            server: "disk01.example.org".to_string(),
            name: "/srv/data01".to_string(),
            status: FsStatus::Enabled,
            weight: 5,
        }
    }

    #[tokio::test]
    async fn legacy_admin_accepts_ok_reply() {
        let addr = one_shot_server("OK\n").await;
        let admin = LegacyAdmin::new(addr, 5);
        admin
            .set_fs_status(&fs_info(), FsStatus::ReadOnly)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn legacy_admin_surfaces_err_reply() {
        let addr = one_shot_server("ERR no such filesystem\n").await;
        let admin = LegacyAdmin::new(addr, 5);
        let err = admin
            .set_fs_status(&fs_info(), FsStatus::ReadOnly)
            .await
            .unwrap_err();
        match err {
            AdminError::Rejected { detail, .. } => {
                assert!(detail.contains("no such filesystem"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn legacy_admin_sends_status_code_and_weight() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            let line = String::from_utf8_lossy(&buf[..n]).to_string();
            socket.write_all(b"OK\n").await.unwrap();
            line
        });

        let admin = LegacyAdmin::new(addr, 5);
        admin
            .set_fs_status(&fs_info(), FsStatus::ReadOnly)
            .await
            .unwrap();

        let line = server.await.unwrap();
        assert_eq!(
            line.trim_end(),
            "MODIFYFS disk01.example.org /srv/data01 2 5"
        );
    }
}
