// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Wire-level tests for the remote COPY client.

use libdrain::copy::{CopyClient, CopyError, HttpCopyClient};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DESTINATION: &str = "http://disk02.example.org:80/srv/data01/dteam/file1?copytoken=abc";

async fn mock_copy_server(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("COPY"))
        .and(path("/dteam/file1"))
        .and(header("Destination", DESTINATION))
        .and(header("X-No-Delegate", "true"))
        .respond_with(ResponseTemplate::new(202).set_body_string(body.to_string()))
        .mount(&server)
        .await;
    server
}

fn source_for(server: &MockServer) -> Url {
    Url::parse(&format!("{}/dteam/file1", server.uri())).unwrap()
}

#[tokio::test]
async fn copy_sends_verb_and_headers_and_reads_success_marker() {
    let server = mock_copy_server("Perf Marker\nTimestamp: 12\n226 Transfer Success\n").await;
    let client = HttpCopyClient::new(None, 10).unwrap();

    client.copy(&source_for(&server), DESTINATION).await.unwrap();
}

#[tokio::test]
async fn failed_marker_surfaces_the_marker_text() {
    let server = mock_copy_server("Perf Marker\nTransfer Failed: dest unreachable\n").await;
    let client = HttpCopyClient::new(None, 10).unwrap();

    let err = client
        .copy(&source_for(&server), DESTINATION)
        .await
        .unwrap_err();
    match err {
        CopyError::Remote(msg) => assert!(msg.contains("dest unreachable")),
        other => panic!("expected Remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn markerless_response_is_a_contact_error() {
    let server = mock_copy_server("").await;
    let client = HttpCopyClient::new(None, 10).unwrap();

    let err = client
        .copy(&source_for(&server), DESTINATION)
        .await
        .unwrap_err();
    assert!(matches!(err, CopyError::NoMarker));
}
