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

//! Dispatches one framed [`Request`] to the [`Engine`] and turns the
//! result into a [`Response`]. The v1 surface from the source, plus the
//! supplemented per-volume detail route (§4.4 of the expanded spec).

use super::request::{Method, Request};
use super::response::Response;
use crate::error::Error;
use crate::registry;
use crate::topology::{Engine, Identity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
struct VolumeSummaryWire {
    id: String,
    count: usize,
}

#[derive(Serialize)]
struct QueryResponse {
    peer_id: String,
    parents: Vec<Identity>,
}

#[derive(Deserialize)]
struct RegisterBody {
    host: String,
    port: String,
    iqn: String,
    lun: String,
}

#[derive(Serialize)]
struct HeartbeatEntryWire {
    peer_id: String,
    parents: Vec<Identity>,
}

#[derive(Serialize)]
struct HealthWire {
    status: &'static str,
}

/// image ids are embedded in a `host:image_id` peer_id by splitting on
/// the first colon; a colon inside an image id would make that split
/// ambiguous, so it's rejected here rather than in the topology core.
fn validate_image_id(image_id: &str) -> Result<(), Error> {
    if image_id.contains(':') {
        Err(Error::InvalidParameter("image id must not contain ':'"))
    } else {
        Ok(())
    }
}

/// Split a path into non-empty segments, mirroring the source's own
/// slash-splitting in front of its query-string grammar.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub async fn dispatch(engine: &Arc<Engine>, req: Request, peer_host: &str) -> Response {
    let path = req.path.split('?').next().unwrap_or("").to_owned();
    let segs = segments(&path);

    let result = match (req.method, segs.as_slice()) {
        (Method::Get, ["volumes"]) => Ok(list(engine)),
        (Method::Get, ["volumes", "query", volume_id]) => {
            query(engine, volume_id, peer_host)
        }
        (Method::Get, ["volumes", volume_id]) => detail(engine, volume_id),
        (Method::Post, ["volumes", volume_id, peer_id]) => {
            register(engine, volume_id, peer_id, &req.body)
        }
        (Method::Delete, ["volumes", volume_id, peer_id]) => remove(engine, volume_id, peer_id),
        (Method::Put, ["members", "heartbeat"]) => Ok(heartbeat(engine, peer_host)),
        (Method::Get, ["health"]) => Ok(health()),
        _ => Err(Error::NotFound),
    };

    match result {
        Ok(resp) => resp,
        Err(e) => Response::from_error(e),
    }
}

fn list(engine: &Arc<Engine>) -> Response {
    let summaries: Vec<VolumeSummaryWire> = engine
        .list()
        .into_iter()
        .map(|s| VolumeSummaryWire {
            id: s.id,
            count: s.count,
        })
        .collect();
    Response::json(200, &summaries)
}

fn query(engine: &Arc<Engine>, volume_id: &str, host: &str) -> Result<Response, Error> {
    validate_image_id(volume_id)?;
    let (peer_id, parents) = engine.query(volume_id, host);
    Ok(Response::json(200, &QueryResponse { peer_id, parents }))
}

fn detail(engine: &Arc<Engine>, volume_id: &str) -> Result<Response, Error> {
    let identities = engine.detail(volume_id)?;
    Ok(Response::json(200, &identities))
}

fn register(
    engine: &Arc<Engine>,
    volume_id: &str,
    peer_id: &str,
    body: &[u8],
) -> Result<Response, Error> {
    validate_image_id(volume_id)?;
    let body: RegisterBody = serde_json::from_slice(body)
        .map_err(|_| Error::InvalidParameter("body must be {host, port, iqn, lun}"))?;
    let identity = engine.register(
        volume_id,
        peer_id,
        &body.host,
        &body.port,
        &body.iqn,
        &body.lun,
    )?;
    Ok(Response::json(200, &identity))
}

fn remove(engine: &Arc<Engine>, volume_id: &str, peer_id: &str) -> Result<Response, Error> {
    engine.remove(volume_id, Some(peer_id))?;
    Ok(Response::empty(200))
}

/// Mirrors the source's `admin::sys` health command: reports whether
/// the registry's process-wide flag is still okay, without touching the
/// topology engine at all.
fn health() -> Response {
    if registry::state_okay() {
        Response::json(200, &HealthWire { status: "healthy" })
    } else {
        Response::json(503, &HealthWire { status: "unhealthy" })
    }
}

fn heartbeat(engine: &Arc<Engine>, host: &str) -> Response {
    let entries: Vec<HeartbeatEntryWire> = engine
        .heartbeat(host)
        .into_iter()
        .map(|e| HeartbeatEntryWire {
            peer_id: e.peer_id,
            parents: e.parents,
        })
        .collect();
    Response::json(200, &entries)
}
