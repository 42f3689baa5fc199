/*
 * Created on Mon Jul 26 2021
 *
 * This file is a part of the source code for the volume-topology tracker
 * Copyright (c) 2021, Sayan Nandan <ohsayan at outlook dot com>
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

//! The secondary host -> nodes index. Lets the scanner reap a whole host
//! in one pass and lets heartbeats refresh liveness in O(1), without
//! walking every tree.

use crate::error::{EngineResult, Error};
use std::collections::HashMap;
use std::time::Instant;

/// One host's bindings across every image it has attached
struct HostEntry {
    last_seen: Instant,
    /// peer_id -> image_id, recovered once at bind time rather than
    /// re-parsed from the peer_id string on every lookup
    bindings: HashMap<String, String>,
}

#[derive(Default)]
pub struct HostIndex {
    hosts: HashMap<String, HostEntry>,
}

impl HostIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `peer_id` (belonging to `image_id`) as bound to `host`,
    /// creating the host's entry if this is its first binding. Fails with
    /// `Duplicate` if `peer_id` is already bound for that host.
    pub fn bind(&mut self, host: &str, peer_id: &str, image_id: &str) -> EngineResult<()> {
        let entry = self.hosts.entry(host.to_owned()).or_insert_with(|| HostEntry {
            last_seen: Instant::now(),
            bindings: HashMap::new(),
        });
        if entry.bindings.contains_key(peer_id) {
            return Err(Error::Duplicate);
        }
        entry.bindings.insert(peer_id.to_owned(), image_id.to_owned());
        Ok(())
    }

    /// Remove a binding. Does not delete the host entry even when its
    /// bindings become empty; only the scanner reaps empty-by-eviction.
    pub fn unbind(&mut self, host: &str, peer_id: &str) -> EngineResult<()> {
        let entry = self.hosts.get_mut(host).ok_or(Error::NotFound)?;
        entry.bindings.remove(peer_id).ok_or(Error::NotFound)?;
        Ok(())
    }

    /// Refresh `host`'s liveness and return a snapshot of its current
    /// bindings (peer_id -> image_id), for recomputing heartbeat parents.
    pub fn touch(&mut self, host: &str) -> Option<Vec<(String, String)>> {
        let entry = self.hosts.get_mut(host)?;
        entry.last_seen = Instant::now();
        Some(
            entry
                .bindings
                .iter()
                .map(|(peer_id, image_id)| (peer_id.clone(), image_id.clone()))
                .collect(),
        )
    }

    /// Every host whose last heartbeat is older than `threshold`, with
    /// its bindings, for the scanner to evict.
    pub fn expired(&self, threshold: std::time::Duration) -> Vec<(String, Vec<(String, String)>)> {
        let now = Instant::now();
        self.hosts
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) > threshold)
            .map(|(host, entry)| {
                let bindings = entry
                    .bindings
                    .iter()
                    .map(|(peer_id, image_id)| (peer_id.clone(), image_id.clone()))
                    .collect();
                (host.clone(), bindings)
            })
            .collect()
    }

    /// Drop a host's entry entirely. Called only by the scanner, after it
    /// has removed every node the host was bound to.
    pub fn evict(&mut self, host: &str) {
        self.hosts.remove(host);
    }

    #[cfg(test)]
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    #[cfg(test)]
    pub fn set_last_seen(&mut self, host: &str, when: Instant) {
        if let Some(entry) = self.hosts.get_mut(host) {
            entry.last_seen = when;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_duplicate_fails() {
        let mut idx = HostIndex::new();
        idx.bind("10.0.0.1", "10.0.0.1:vol-A", "vol-A").unwrap();
        let err = idx.bind("10.0.0.1", "10.0.0.1:vol-A", "vol-A").unwrap_err();
        assert_eq!(err, Error::Duplicate);
    }

    #[test]
    fn unbind_unknown_host_not_found() {
        let mut idx = HostIndex::new();
        let err = idx.unbind("nope", "x").unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[test]
    fn unbind_keeps_empty_host_entry() {
        let mut idx = HostIndex::new();
        idx.bind("10.0.0.1", "10.0.0.1:vol-A", "vol-A").unwrap();
        idx.unbind("10.0.0.1", "10.0.0.1:vol-A").unwrap();
        assert!(idx.contains("10.0.0.1"));
    }

    #[test]
    fn touch_unknown_host_returns_none() {
        let mut idx = HostIndex::new();
        assert!(idx.touch("nope").is_none());
    }

    #[test]
    fn expired_respects_threshold() {
        use std::time::Duration;
        let mut idx = HostIndex::new();
        idx.bind("10.0.0.1", "10.0.0.1:vol-A", "vol-A").unwrap();
        idx.set_last_seen("10.0.0.1", Instant::now() - Duration::from_secs(60));
        let expired = idx.expired(Duration::from_secs(30));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, "10.0.0.1");
    }
}
