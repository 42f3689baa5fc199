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

use serde::Serialize;

/// A node's index into its tree's arena. Stable for the node's lifetime;
/// never reused while the node is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(super) u32);

/// Lifecycle state of a [`Node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Queried but has not yet registered its iSCSI addressing
    Pending,
    /// Fully load-bearing: registered and ready to be pulled from
    #[serde(rename = "OK")]
    Ok,
}

/// A vertex in one image's tree
#[derive(Debug, Clone)]
pub struct Node {
    pub peer_id: String,
    pub host: String,
    pub port: String,
    pub iqn: String,
    pub lun: String,
    pub status: Status,
    pub level: u32,
    pub fake_root: bool,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    /// Monotonic insertion sequence, used to recover insertion order for
    /// same-level peer listings after slot reuse has scrambled arena indices
    pub(super) seq: u32,
}

/// The wire view of a [`Node`] returned to clients: enough to open an
/// iSCSI session against the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub host: String,
    pub port: String,
    pub iqn: String,
    pub lun: String,
    pub status: Status,
    pub peer_id: String,
}

impl Node {
    /// A node can accept another child iff it is `OK` and has a free slot
    pub fn available(&self) -> bool {
        self.status == Status::Ok && (self.left.is_none() || self.right.is_none())
    }

    pub fn identity(&self) -> Identity {
        Identity {
            host: self.host.clone(),
            port: self.port.clone(),
            iqn: self.iqn.clone(),
            lun: self.lun.clone(),
            status: self.status,
            peer_id: self.peer_id.clone(),
        }
    }
}
