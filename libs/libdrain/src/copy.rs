// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Remote copy protocol.
//!
//! A relocation is a third-party HTTP `COPY`: the request goes to the
//! source's secure endpoint with a `Destination` header naming the new
//! location's plain endpoint, and the WebDAV gateway pushes the bytes
//! directly between disk nodes. Progress arrives as performance markers
//! in the response body; the outcome is decided by scanning them for
//! `Success` / `Failed` tokens.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Identity, Method};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Remote copy errors.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed destination location: {0}")]
    MalformedLocation(String),

    /// The remote reported a `Failed` marker
    #[error("Remote copy failed: {0}")]
    Remote(String),

    /// No marker at all in the response
    #[error("Error contacting the remote disknode")]
    NoMarker,

    #[error("Copy aborted by cancellation")]
    Cancelled,
}

/// The copy seam. One call per relocation; blocking for its duration.
#[async_trait]
pub trait CopyClient: Send + Sync {
    async fn copy(&self, source: &Url, destination: &str) -> Result<(), CopyError>;
}

/// Production copy client.
pub struct HttpCopyClient {
    client: Client,
}

impl HttpCopyClient {
    /// Build the client. `identity` is the host certificate/key pair the
    /// WebDAV gateways authenticate; peer verification is disabled
    /// because disk nodes present host certificates outside the client
    /// CA set.
    pub fn new(identity: Option<Identity>, timeout_secs: u64) -> Result<Self, CopyError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(identity) = identity {
            builder = builder.identity(identity);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl CopyClient for HttpCopyClient {
    async fn copy(&self, source: &Url, destination: &str) -> Result<(), CopyError> {
        debug!(source = %source, destination = %destination, "Issuing COPY");

        let response = self
            .client
            .request(Method::from_bytes(b"COPY").unwrap_or(Method::GET), source.clone())
            .header("Destination", destination)
            .header("X-No-Delegate", "true")
            .send()
            .await?;

        let body = response.text().await?;
        scan_markers(&body)
    }
}

/// Decide the outcome of a COPY from the response body markers.
pub fn scan_markers(body: &str) -> Result<(), CopyError> {
    for line in body.lines() {
        if line.contains("Success") {
            return Ok(());
        }
        if line.contains("Failed") {
            return Err(CopyError::Remote(line.trim().to_string()));
        }
    }
    Err(CopyError::NoMarker)
}

/// Secure source endpoint the COPY is issued against.
pub fn source_url(server: &str, https_port: u16, lfn: &str) -> Result<Url, CopyError> {
    let path = if lfn.starts_with('/') {
        lfn.to_string()
    } else {
        format!("/{}", lfn)
    };
    Ok(Url::parse(&format!(
        "https://{}:{}{}",
        server, https_port, path
    ))?)
}

/// Split a placement location `host:/path[?args]` into the
/// `Destination` header value (plain endpoint, explicit port) and the
/// new copy's physical file name (location without the transfer args).
pub fn rewrite_destination(
    location: &str,
    http_port: u16,
) -> Result<(String, String), CopyError> {
    let Some((host, rest)) = location.split_once(':') else {
        return Err(CopyError::MalformedLocation(location.to_string()));
    };
    if host.is_empty() || rest.is_empty() {
        return Err(CopyError::MalformedLocation(location.to_string()));
    }

    let destination = format!("http://{}:{}{}", host, http_port, rest);
    let path = rest.split_once('?').map_or(rest, |(p, _)| p);
    let sfn = format!("{}:{}", host, path);

    Ok((destination, sfn))
}
