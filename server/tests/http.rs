/*
 * Created on Mon Jul 13 2020
 *
 * This file is a part of the source code for the volume-topology tracker
 * Copyright (c) 2020, Sayan Nandan <ohsayan at outlook dot com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! End-to-end coverage of the six concrete scenarios from the expanded
//! spec's TESTABLE PROPERTIES section, driven over the real HTTP
//! surface against a server spawned in-process on an ephemeral port —
//! the same split the source makes between unit tests colocated with a
//! module and a separate driver exercising the whole running service.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use voltd::topology::{Engine, Policy};

async fn spawn_server(policy: Policy) -> SocketAddr {
    let engine = Engine::new(policy, Duration::from_secs(30));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(voltd::http::serve(listener, engine));
    addr
}

fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

#[tokio::test]
async fn empty_start_then_first_query_returns_no_parents() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();

    let resp: Value = client
        .get(format!("{}/volumes/query/vol-A", base_url(addr)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["parents"], json!([]));
    assert!(resp["peer_id"].as_str().unwrap().ends_with(":vol-A"));
}

#[tokio::test]
async fn second_host_also_parents_under_root() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();
    let url = format!("{}/volumes/query/vol-A", base_url(addr));

    client.get(&url).send().await.unwrap();
    let resp: Value = client.get(&url).send().await.unwrap().json().await.unwrap();

    assert_eq!(resp["parents"], json!([]));
}

#[tokio::test]
async fn third_host_gets_first_as_parent_and_second_as_peer() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();
    let url = format!("{}/volumes/query/vol-A", base_url(addr));

    client.get(&url).send().await.unwrap();
    client.get(&url).send().await.unwrap();
    let resp: Value = client.get(&url).send().await.unwrap().json().await.unwrap();

    let parents = resp["parents"].as_array().unwrap();
    assert_eq!(parents.len(), 2);
}

#[tokio::test]
async fn register_transitions_pending_to_ok() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();
    let base = base_url(addr);

    let query: Value = client
        .get(format!("{base}/volumes/query/vol-A"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let peer_id = query["peer_id"].as_str().unwrap();

    let resp = client
        .post(format!("{base}/volumes/vol-A/{peer_id}"))
        .json(&json!({"host": "10.0.0.1", "port": "3260", "iqn": "iqn.test", "lun": "0"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let identity: Value = resp.json().await.unwrap();
    assert_eq!(identity["status"], "OK");
}

#[tokio::test]
async fn remove_then_list_restores_node_count() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();
    let base = base_url(addr);

    let query: Value = client
        .get(format!("{base}/volumes/query/vol-A"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let peer_id = query["peer_id"].as_str().unwrap();

    let resp = client
        .delete(format!("{base}/volumes/vol-A/{peer_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let detail: Value = client
        .get(format!("{base}/volumes/vol-A"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn heartbeat_of_unknown_host_is_empty_array() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();

    let resp: Value = client
        .put(format!("{}/members/heartbeat", base_url(addr)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp, json!([]));
}

#[tokio::test]
async fn list_reports_volume_and_node_count() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();
    let base = base_url(addr);

    client
        .get(format!("{base}/volumes/query/vol-A"))
        .send()
        .await
        .unwrap();

    let list: Value = client
        .get(format!("{base}/volumes"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = list.as_array().unwrap();
    let vol_a = entries.iter().find(|e| e["id"] == "vol-A").unwrap();
    assert_eq!(vol_a["count"], 2);
}

#[tokio::test]
async fn colon_in_image_id_is_rejected() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/volumes/query/bad:id", base_url(addr)))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let addr = spawn_server(Policy::BTree).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/nonexistent", base_url(addr)))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
