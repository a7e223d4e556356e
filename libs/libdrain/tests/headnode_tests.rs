// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Wire-level tests for the head-node REST client.

use libdrain::admin::{AdminBackend, DomeAdmin};
use libdrain::catalog::{Catalog, CatalogError, PlacementHints};
use libdrain::headnode::{HeadNodeClient, HeadNodeConfig};
use libdrain::inventory::Inventory;
use libdrain::types::{FsInfo, FsStatus, ReplicaStatus};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HeadNodeClient {
    HeadNodeClient::new(HeadNodeConfig {
        base_url: server.uri(),
        identity: None,
        client_dn: Some("/DC=org/DC=example/CN=drainhost".to_string()),
        client_address: Some("192.0.2.10".to_string()),
        timeout_secs: 10,
    })
    .unwrap()
}

#[tokio::test]
async fn pools_come_from_getspaceinfo() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/command/dome_getspaceinfo"))
        .and(header("remoteclientdn", "/DC=org/DC=example/CN=drainhost"))
        .and(header("remoteclientaddr", "192.0.2.10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "poolinfo": [
                { "poolname": "pool01" },
                { "poolname": "pool02" }
            ]
        })))
        .mount(&server)
        .await;

    let pools = client_for(&server).pools().await.unwrap();
    assert_eq!(pools, vec!["pool01".to_string(), "pool02".to_string()]);
}

#[tokio::test]
async fn filesystems_parse_status_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/command/dome_statpool"))
        .and(body_json(json!({ "poolname": "pool01" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fsinfo": [
                {
                    "poolname": "pool01",
                    "server": "disk01.example.org",
                    "fsname": "/srv/data01",
                    "status": 0,
                    "weight": 5
                },
                {
                    "poolname": "pool01",
                    "server": "disk02.example.org",
                    "fsname": "/srv/data01",
                    "status": 2,
                    "weight": 3
                }
            ]
        })))
        .mount(&server)
        .await;

    let filesystems = client_for(&server).filesystems("pool01").await.unwrap();
    assert_eq!(filesystems.len(), 2);
    assert_eq!(filesystems[0].status, FsStatus::Enabled);
    assert_eq!(filesystems[1].status, FsStatus::ReadOnly);
    assert_eq!(filesystems[1].weight, 3);
}

#[tokio::test]
async fn unknown_group_is_none_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/command/dome_getgroup"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gid = client_for(&server).group_id("nosuch").await.unwrap();
    assert!(gid.is_none());
}

#[tokio::test]
async fn where_to_write_joins_host_and_pfn() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/command/dome_put"))
        .and(body_json(json!({
            "lfn": "/dteam/file1",
            "additionalreplica": "true",
            "spacetoken": "DTEAMDISK"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "host": "disk02.example.org",
            "pfn": "/srv/data01/dteam/file1?copytoken=xyz"
        })))
        .mount(&server)
        .await;

    let hints = PlacementHints {
        space_token: Some("DTEAMDISK".to_string()),
        ..Default::default()
    };
    let location = client_for(&server)
        .where_to_write("/dteam/file1", &hints)
        .await
        .unwrap();
    assert_eq!(
        location,
        "disk02.example.org:/srv/data01/dteam/file1?copytoken=xyz"
    );
}

#[tokio::test]
async fn missing_replica_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/command/dome_getreplicainfo"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .replica_by_rfn("disk01.example.org:/srv/data01/gone")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

#[tokio::test]
async fn replica_info_maps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/command/dome_getreplicainfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rfn": "disk01.example.org:/srv/data01/dteam/file1",
            "status": "-",
            "poolname": "pool01"
        })))
        .mount(&server)
        .await;

    let replica = client_for(&server)
        .replica_by_rfn("disk01.example.org:/srv/data01/dteam/file1")
        .await
        .unwrap();
    assert_eq!(replica.status, ReplicaStatus::Available);
    assert_eq!(replica.pool, "pool01");
}

#[tokio::test]
async fn dome_admin_posts_modifyfs_with_numeric_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command/dome_modifyfs"))
        .and(body_json(json!({
            "poolname": "pool01",
            "server": "disk01.example.org",
            "fsname": "/srv/data01",
            "status": 2
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let admin = DomeAdmin::new(client_for(&server));
    let fs = FsInfo {
        pool: "pool01".to_string(),
        server: "disk01.example.org".to_string(),
        name: "/srv/data01".to_string(),
        status: FsStatus::Enabled,
        weight: 5,
    };
    admin.set_fs_status(&fs, FsStatus::ReadOnly).await.unwrap();
}

#[tokio::test]
async fn dome_admin_surfaces_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command/dome_modifyfs"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk offline"))
        .mount(&server)
        .await;

    let admin = DomeAdmin::new(client_for(&server));
    let fs = FsInfo {
        pool: "pool01".to_string(),
        server: "disk01.example.org".to_string(),
        name: "/srv/data01".to_string(),
        status: FsStatus::Enabled,
        weight: 5,
    };
    let err = admin
        .set_fs_status(&fs, FsStatus::ReadOnly)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk01.example.org:/srv/data01"));
}
