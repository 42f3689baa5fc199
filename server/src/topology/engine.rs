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

//! The public façade. Owns `image_id -> Tree` and the [`HostIndex`],
//! serializes all mutations behind a single lock, and is the only
//! component the HTTP layer talks to.

use super::host_index::HostIndex;
use super::node::{Identity, Node, Status};
use super::policy::Policy;
use super::tree::Tree;
use crate::error::{EngineResult, Error};
use crate::scanner;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// One entry of `Engine::list`
pub struct VolumeSummary {
    pub id: String,
    pub count: usize,
}

/// One entry of `Engine::heartbeat`
pub struct HeartbeatEntry {
    pub peer_id: String,
    pub parents: Vec<Identity>,
}

struct State {
    trees: HashMap<String, Tree>,
    hosts: HostIndex,
}

pub struct Engine {
    state: Mutex<State>,
    policy: Policy,
    heartbeat_expiry: Duration,
    scanner_started: AtomicBool,
    term_tx: broadcast::Sender<()>,
}

impl Engine {
    pub fn new(policy: Policy, heartbeat_expiry: Duration) -> Arc<Self> {
        let (term_tx, _) = broadcast::channel(1);
        Arc::new(Engine {
            state: Mutex::new(State {
                trees: HashMap::new(),
                hosts: HostIndex::new(),
            }),
            policy,
            heartbeat_expiry,
            scanner_started: AtomicBool::new(false),
            term_tx,
        })
    }

    /// Signal the scanner task (if started) to stop. Used by tests that
    /// want a clean shutdown; production `main` never calls this.
    pub fn shutdown(&self) {
        let _ = self.term_tx.send(());
    }

    fn start_scanner_if_needed(self: &Arc<Self>) {
        if self
            .scanner_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let engine = Arc::clone(self);
            let rx = self.term_tx.subscribe();
            tokio::spawn(scanner::run(engine, rx));
        }
    }

    /// §4.4.1 `query`
    pub fn query(self: &Arc<Self>, image_id: &str, host: &str) -> (String, Vec<Identity>) {
        self.start_scanner_if_needed();
        let peer_id = format!("{host}:{image_id}");
        let mut state = self.state.lock();
        let tree = state
            .trees
            .entry(image_id.to_owned())
            .or_insert_with(|| Tree::new(image_id));

        let id = if let Some(id) = tree.get_id(&peer_id) {
            id
        } else {
            let node = Node {
                peer_id: peer_id.clone(),
                host: host.to_owned(),
                port: String::new(),
                iqn: String::new(),
                lun: String::new(),
                status: Status::Pending,
                level: 0,
                fake_root: false,
                parent: None,
                left: None,
                right: None,
                seq: 0,
            };
            let id = tree
                .insert(node)
                .expect("a brand new peer_id with no parent always has room: root is always OK");
            // The peer_id check above makes a Duplicate here unreachable;
            // if it ever fires it's a bug in that invariant, not a caller error.
            if let Err(e) = state.hosts.bind(host, &peer_id, image_id) {
                log::warn!(
                    "bind() reported {e:?} for a peer_id we just confirmed was fresh; swallowing"
                );
            }
            id
        };

        let parents = state.trees[image_id].get_parents(id, self.policy);
        (peer_id, parents)
    }

    /// §4.4.2 `register`
    pub fn register(
        &self,
        image_id: &str,
        peer_id: &str,
        host: &str,
        port: &str,
        iqn: &str,
        lun: &str,
    ) -> EngineResult<Identity> {
        let mut state = self.state.lock();
        let identity = {
            let tree = state.trees.get_mut(image_id).ok_or(Error::NotFound)?;
            let id = if let Some(id) = tree.get_id(peer_id) {
                id
            } else {
                let node = Node {
                    peer_id: peer_id.to_owned(),
                    host: host.to_owned(),
                    port: port.to_owned(),
                    iqn: iqn.to_owned(),
                    lun: lun.to_owned(),
                    status: Status::Ok,
                    level: 0,
                    fake_root: false,
                    parent: None,
                    left: None,
                    right: None,
                    seq: 0,
                };
                tree.insert(node)?
            };
            tree.set_addressing(id, host, port, iqn, lun);
            tree.node(id).identity()
        };
        // host bookkeeping may not exist yet if register() created the
        // node directly without a prior query()
        let _ = state.hosts.bind(host, peer_id, image_id);
        Ok(identity)
    }

    /// §4.4.3 `remove`
    pub fn remove(&self, image_id: &str, peer_id: Option<&str>) -> EngineResult<()> {
        let peer_id = peer_id.ok_or(Error::InvalidParameter("peer_id must not be null"))?;
        let mut state = self.state.lock();
        let tree = state.trees.get(image_id).ok_or(Error::NotFound)?;
        if !tree.contains(peer_id) {
            return Err(Error::NotFound);
        }
        let host = tree.by_peer(peer_id).unwrap().host.clone();
        let _ = state.hosts.unbind(&host, peer_id);
        state.trees.get_mut(image_id).unwrap().remove(peer_id)?;
        Ok(())
    }

    /// §4.4.4 `list`
    pub fn list(&self) -> Vec<VolumeSummary> {
        let state = self.state.lock();
        state
            .trees
            .iter()
            .map(|(id, tree)| VolumeSummary {
                id: id.clone(),
                count: tree.len(),
            })
            .collect()
    }

    /// Supplemental read-only accessor recovered from
    /// `original_source/volt/executor/impl_btree.py`'s
    /// `get_volumes_detail`: every node currently in one image's tree.
    pub fn detail(&self, image_id: &str) -> EngineResult<Vec<Identity>> {
        let state = self.state.lock();
        let tree = state.trees.get(image_id).ok_or(Error::NotFound)?;
        Ok(tree.identities())
    }

    /// §4.4.5 `heartbeat`
    pub fn heartbeat(&self, host: &str) -> Vec<HeartbeatEntry> {
        let mut state = self.state.lock();
        let bindings = match state.hosts.touch(host) {
            Some(b) => b,
            None => return Vec::new(),
        };
        bindings
            .into_iter()
            .filter_map(|(peer_id, image_id)| {
                let tree = state.trees.get(&image_id)?;
                let id = tree.get_id(&peer_id)?;
                Some(HeartbeatEntry {
                    parents: tree.get_parents(id, self.policy),
                    peer_id,
                })
            })
            .collect()
    }

    /// Invoked by the scanner on each pass: evict every host whose last
    /// heartbeat is older than `threshold`, removing its nodes from
    /// every tree it belonged to. Failures (a node already gone because
    /// two removals raced) are logged and swallowed; the next pass is
    /// authoritative.
    pub fn evict_expired(&self) {
        let mut state = self.state.lock();
        let expired = state.hosts.expired(self.heartbeat_expiry);
        for (host, bindings) in expired {
            for (peer_id, image_id) in bindings {
                match state.trees.get_mut(&image_id) {
                    Some(tree) => {
                        if let Err(e) = tree.remove(&peer_id) {
                            log::warn!("scanner: removing {peer_id} from {image_id}: {e}");
                        }
                    }
                    None => log::warn!("scanner: {image_id} has no tree for bound peer {peer_id}"),
                }
            }
            state.hosts.evict(&host);
            log::info!("scanner: evicted host {host} after {:?} of silence", self.heartbeat_expiry);
        }
    }

    pub fn heartbeat_expiry(&self) -> Duration {
        self.heartbeat_expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine() -> Arc<Engine> {
        Engine::new(Policy::BTree, Duration::from_secs(30))
    }

    #[test]
    fn query_is_idempotent() {
        let e = engine();
        let (p1, parents1) = e.query("vol-A", "10.0.0.1");
        let (p2, parents2) = e.query("vol-A", "10.0.0.1");
        assert_eq!(p1, p2);
        assert_eq!(parents1, parents2);
        assert_eq!(e.detail("vol-A").unwrap().len(), 2);
    }

    #[test]
    fn scenario_empty_start_first_query() {
        let e = engine();
        let (peer_id, parents) = e.query("vol-A", "10.0.0.1");
        assert_eq!(peer_id, "10.0.0.1:vol-A");
        assert!(parents.is_empty());
        assert_eq!(e.detail("vol-A").unwrap().len(), 2);
    }

    #[test]
    fn scenario_second_host_also_parents_under_root() {
        let e = engine();
        e.query("vol-A", "10.0.0.1");
        let (peer_id, parents) = e.query("vol-A", "10.0.0.2");
        assert_eq!(peer_id, "10.0.0.2:vol-A");
        assert!(parents.is_empty());
        assert_eq!(e.detail("vol-A").unwrap().len(), 3);
    }

    #[test]
    fn scenario_third_host_gets_first_as_parent_and_second_as_peer() {
        let e = engine();
        e.query("vol-A", "10.0.0.1");
        e.query("vol-A", "10.0.0.2");
        let (_, parents) = e.query("vol-A", "10.0.0.3");
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].peer_id, "10.0.0.1:vol-A");
        assert_eq!(parents[1].peer_id, "10.0.0.2:vol-A");
    }

    #[test]
    fn register_transitions_pending_to_ok_without_duplicating() {
        let e = engine();
        let (peer_id, _) = e.query("vol-A", "10.0.0.1");
        let identity = e
            .register("vol-A", &peer_id, "10.0.0.1", "3260", "iqn.x", "0")
            .unwrap();
        assert_eq!(identity.status, Status::Ok);
        let (peer_id2, _) = e.query("vol-A", "10.0.0.1");
        assert_eq!(peer_id, peer_id2);
        assert_eq!(e.detail("vol-A").unwrap().len(), 2);
    }

    #[test]
    fn remove_after_query_restores_node_set() {
        let e = engine();
        let before = e.detail("vol-A").map(|v| v.len()).unwrap_or(1);
        let (peer_id, _) = e.query("vol-A", "10.0.0.1");
        e.remove("vol-A", Some(&peer_id)).unwrap();
        assert_eq!(e.detail("vol-A").unwrap().len(), before);
    }

    #[test]
    fn remove_reparents_the_removed_nodes_child() {
        let e = engine();
        e.query("vol-A", "10.0.0.1");
        e.query("vol-A", "10.0.0.2");
        e.query("vol-A", "10.0.0.3");
        e.remove("vol-A", Some("10.0.0.1:vol-A")).unwrap();
        assert_eq!(e.detail("vol-A").unwrap().len(), 3);
        let hb = e.heartbeat("10.0.0.3");
        assert_eq!(hb.len(), 1);
        assert_eq!(hb[0].parents[0].peer_id, "10.0.0.2:vol-A");
    }

    #[test]
    fn remove_requires_non_null_peer_id() {
        let e = engine();
        let err = e.remove("vol-A", None).unwrap_err();
        assert_eq!(err, Error::InvalidParameter("peer_id must not be null"));
    }

    #[test]
    fn remove_unknown_tree_not_found() {
        let e = engine();
        let err = e.remove("nope", Some("x:nope")).unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[test]
    fn heartbeat_of_unknown_host_is_empty() {
        let e = engine();
        assert!(e.heartbeat("nowhere").is_empty());
    }

    #[test]
    fn list_counts_include_the_synthetic_root() {
        let e = engine();
        e.query("vol-A", "10.0.0.1");
        let summaries = e.list();
        let vol_a = summaries.iter().find(|s| s.id == "vol-A").unwrap();
        assert_eq!(vol_a.count, 2);
    }

    #[test]
    fn with_uncle_policy_returns_parent_and_sibling_only() {
        let e = Engine::new(Policy::BTreeWithUncle, Duration::from_secs(30));
        e.query("vol-A", "10.0.0.1");
        e.query("vol-A", "10.0.0.2");
        let (_, parents) = e.query("vol-A", "10.0.0.3");
        // 10.0.0.3 attaches under 10.0.0.1; its parent's sibling is 10.0.0.2
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].peer_id, "10.0.0.1:vol-A");
        assert_eq!(parents[1].peer_id, "10.0.0.2:vol-A");
    }
}
