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

//! One image's binary tree.
//!
//! The source used direct mutable parent/child references, which makes a
//! two-way pointer graph in a GC-less language. This arena keeps every
//! [`Node`] in a `Vec` and addresses them by [`NodeId`], so `parent`/`left`/
//! `right` are plain integers; a free list lets a removed node's slot be
//! reused by the next insert.

use super::node::{Identity, Node, NodeId, Status};
use super::policy::Policy;
use crate::error::{EngineResult, Error};
use std::collections::{HashMap, VecDeque};

enum Slot {
    Occupied(Node),
    Free(Option<u32>),
}

pub struct Tree {
    pub image_id: String,
    arena: Vec<Slot>,
    free_head: Option<u32>,
    root: NodeId,
    /// peer_id -> arena index, always contains `root`
    nodes: HashMap<String, NodeId>,
    next_seq: u32,
}

impl Tree {
    /// Construct a tree with a synthetic, always-OK root. The root's
    /// addressing fields are opaque filler, generated the way the source
    /// generated a throwaway uuid for them.
    pub fn new(image_id: impl Into<String>) -> Self {
        let image_id = image_id.into();
        let root_peer_id = uuid::Uuid::new_v4().to_string();
        let root = Node {
            peer_id: root_peer_id.clone(),
            host: uuid::Uuid::new_v4().to_string(),
            port: uuid::Uuid::new_v4().to_string(),
            iqn: uuid::Uuid::new_v4().to_string(),
            lun: uuid::Uuid::new_v4().to_string(),
            status: Status::Ok,
            level: 0,
            fake_root: true,
            parent: None,
            left: None,
            right: None,
            seq: 0,
        };
        let mut nodes = HashMap::new();
        nodes.insert(root_peer_id, NodeId(0));
        Tree {
            image_id,
            arena: vec![Slot::Occupied(root)],
            free_head: None,
            root: NodeId(0),
            nodes,
            next_seq: 1,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.nodes.contains_key(peer_id)
    }

    pub fn get_id(&self, peer_id: &str) -> Option<NodeId> {
        self.nodes.get(peer_id).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        match &self.arena[id.0 as usize] {
            Slot::Occupied(n) => n,
            Slot::Free(_) => panic!("dangling NodeId {}", id.0),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match &mut self.arena[id.0 as usize] {
            Slot::Occupied(n) => n,
            Slot::Free(_) => panic!("dangling NodeId {}", id.0),
        }
    }

    pub fn by_peer(&self, peer_id: &str) -> Option<&Node> {
        self.get_id(peer_id).map(|id| self.node(id))
    }

    /// The other child of `id`'s parent, or `None` if `id` is the root or
    /// an only child. Mirrors the source's `BTreeNode.get_sibling`.
    pub fn sibling_of(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let parent = self.node(parent);
        if parent.left == Some(id) {
            parent.right
        } else {
            parent.left
        }
    }

    /// Breadth-first scan from the root; the first node with `status ==
    /// OK` and a free child slot. Children are enqueued left-then-right so
    /// the tree fills level by level, left before right.
    pub fn find_available_slot(&self) -> Option<NodeId> {
        let mut queue = VecDeque::new();
        queue.push_back(self.root);
        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            if node.available() {
                return Some(id);
            }
            if let Some(l) = node.left {
                queue.push_back(l);
            }
            if let Some(r) = node.right {
                queue.push_back(r);
            }
        }
        None
    }

    /// Breadth-first scan over the subtree rooted at `start`, for the
    /// first node with any free child slot, regardless of `status`.
    /// Used by [`Self::remove_by_id`] to find a graft point for a
    /// removed node's right subtree: unlike insertion, grafting doesn't
    /// need the destination to be `OK`, and since `start`'s subtree is
    /// finite and every leaf has two free slots, this always terminates
    /// with a node.
    fn find_free_slot_in(&self, start: NodeId) -> NodeId {
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            if node.left.is_none() || node.right.is_none() {
                return id;
            }
            queue.push_back(node.left.expect("checked above"));
            queue.push_back(node.right.expect("checked above"));
        }
        unreachable!("a finite non-empty subtree always has a node with a free slot")
    }

    fn alloc(&mut self, mut node: Node) -> NodeId {
        node.seq = self.next_seq;
        self.next_seq += 1;
        if let Some(free) = self.free_head {
            self.free_head = match &self.arena[free as usize] {
                Slot::Free(next) => *next,
                Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
            };
            self.arena[free as usize] = Slot::Occupied(node);
            NodeId(free)
        } else {
            let id = NodeId(self.arena.len() as u32);
            self.arena.push(Slot::Occupied(node));
            id
        }
    }

    fn free(&mut self, id: NodeId) -> Node {
        let slot = std::mem::replace(&mut self.arena[id.0 as usize], Slot::Free(self.free_head));
        self.free_head = Some(id.0);
        match slot {
            Slot::Occupied(n) => n,
            Slot::Free(_) => panic!("double free of NodeId {}", id.0),
        }
    }

    /// Insert a freshly constructed, parentless node at the shallowest
    /// available slot. Fails with `InvalidParameter` if the peer_id is
    /// already present or no slot exists (the latter never happens while
    /// the root is always OK).
    pub fn insert(&mut self, mut new_node: Node) -> EngineResult<NodeId> {
        if self.nodes.contains_key(&new_node.peer_id) {
            return Err(Error::InvalidParameter("peer_id already exists in tree"));
        }
        if new_node.parent.is_some() {
            return Err(Error::InvalidParameter("new node already has a parent"));
        }
        let slot_id = self
            .find_available_slot()
            .ok_or(Error::InvalidParameter("no available slot"))?;

        new_node.left = None;
        new_node.right = None;
        new_node.parent = Some(slot_id);
        new_node.level = self.node(slot_id).level + 1;
        let peer_id = new_node.peer_id.clone();
        let id = self.alloc(new_node);
        self.nodes.insert(peer_id, id);

        let slot = self.node_mut(slot_id);
        if slot.left.is_none() {
            slot.left = Some(id);
        } else {
            slot.right = Some(id);
        }
        Ok(id)
    }

    /// Remove the node bound to `peer_id`. See module docs and spec for
    /// the four-case splice; pending nodes take their whole subtree with
    /// them rather than being reparented.
    pub fn remove(&mut self, peer_id: &str) -> EngineResult<Node> {
        let target = self
            .get_id(peer_id)
            .ok_or(Error::NotFound)?;
        Ok(self.remove_by_id(target))
    }

    fn remove_by_id(&mut self, target: NodeId) -> Node {
        // Case 1: a pending node is not yet load-bearing. Its subtrees are
        // evicted with it rather than reparented onto the grandparent;
        // this is reproduced from the source as-is (see spec §9): if a
        // parent never registers, healthy descendants are lost with it.
        let (left, right, status) = {
            let n = self.node(target);
            (n.left, n.right, n.status)
        };
        if status == Status::Pending {
            if let Some(l) = left {
                self.remove_by_id(l);
            }
            if let Some(r) = right {
                self.remove_by_id(r);
            }
        }

        let (left, right) = {
            let n = self.node(target);
            (n.left, n.right)
        };
        let up = match (left, right) {
            (Some(l), Some(r)) => {
                // graft target's right subtree onto the first free slot
                // found by a BFS over target's left subtree. A plain
                // leftward walk can dead-end on a still-pending leaf
                // (available() requires OK, but a pending leaf has no
                // left child to keep descending into), so this looks for
                // any free slot rather than assuming one lies straight
                // down the left spine.
                let current = self.find_free_slot_in(l);
                self.node_mut(r).parent = Some(current);
                let cur = self.node_mut(current);
                if cur.left.is_none() {
                    cur.left = Some(r);
                } else {
                    cur.right = Some(r);
                }
                Some(l)
            }
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        };

        let parent = self.node(target).parent;
        if let Some(up) = up {
            self.node_mut(up).parent = parent;
        }
        if let Some(parent) = parent {
            let p = self.node_mut(parent);
            if p.left == Some(target) {
                p.left = up;
            } else {
                p.right = up;
            }
        }
        if target == self.root {
            self.root = up.expect("removing the synthetic root is not a supported operation");
        }

        self.recompute_levels();
        let node = self.free(target);
        self.nodes.remove(&node.peer_id);
        node
    }

    /// Re-walk the whole tree breadth-first and recompute every node's
    /// level from its parent. Root's level is 0.
    fn recompute_levels(&mut self) {
        let mut queue = VecDeque::new();
        queue.push_back(self.root);
        self.node_mut(self.root).level = 0;
        while let Some(id) = queue.pop_front() {
            let (left, right) = {
                let n = self.node(id);
                (n.left, n.right)
            };
            let level = self.node(id).level;
            if let Some(l) = left {
                self.node_mut(l).level = level + 1;
                queue.push_back(l);
            }
            if let Some(r) = right {
                self.node_mut(r).level = level + 1;
                queue.push_back(r);
            }
        }
    }

    /// Every node at `level`, in insertion order
    pub fn nodes_at_level(&self, level: u32) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .copied()
            .filter(|id| self.node(*id).level == level)
            .collect();
        ids.sort_by_key(|id| self.node(*id).seq);
        ids
    }

    /// The list of peers a newly attached (or heartbeating) host should
    /// pull from: empty if `id`'s parent is the synthetic root, else the
    /// active policy's view.
    pub fn get_parents(&self, id: NodeId, policy: Policy) -> Vec<Identity> {
        let parent = match self.node(id).parent {
            Some(p) => p,
            None => return Vec::new(),
        };
        if self.node(parent).fake_root {
            return Vec::new();
        }
        policy.parents(self, id, parent)
    }

    /// Overwrite a node's addressing fields and mark it `OK`. This is the
    /// pending -> OK transition driven by `register`; children already
    /// attached to this node (from while it was pending) are left alone.
    pub fn set_addressing(&mut self, id: NodeId, host: &str, port: &str, iqn: &str, lun: &str) {
        let node = self.node_mut(id);
        node.host = host.to_owned();
        node.port = port.to_owned();
        node.iqn = iqn.to_owned();
        node.lun = lun.to_owned();
        node.status = Status::Ok;
    }

    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<NodeId> = self.nodes.values().copied().collect();
        ids.sort_by_key(|id| self.node(*id).seq);
        ids.into_iter().map(|id| self.node(id).identity()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::node::Status;

    fn pending(peer_id: &str, host: &str) -> Node {
        Node {
            peer_id: peer_id.to_owned(),
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
        }
    }

    fn ok(peer_id: &str, host: &str) -> Node {
        let mut n = pending(peer_id, host);
        n.status = Status::Ok;
        n
    }

    #[test]
    fn insert_fills_left_before_right() {
        let mut t = Tree::new("vol-A");
        let a = t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap();
        let b = t.insert(ok("10.0.0.2:vol-A", "10.0.0.2")).unwrap();
        let root = t.root_id();
        assert_eq!(t.node(root).left, Some(a));
        assert_eq!(t.node(root).right, Some(b));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn third_insert_attaches_to_left_child() {
        let mut t = Tree::new("vol-A");
        let a = t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap();
        t.insert(ok("10.0.0.2:vol-A", "10.0.0.2")).unwrap();
        let c = t.insert(ok("10.0.0.3:vol-A", "10.0.0.3")).unwrap();
        assert_eq!(t.node(c).parent, Some(a));
        assert_eq!(t.node(a).left, Some(c));
    }

    #[test]
    fn duplicate_peer_id_rejected() {
        let mut t = Tree::new("vol-A");
        t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap();
        let err = t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap_err();
        assert_eq!(err, Error::InvalidParameter("peer_id already exists in tree"));
    }

    #[test]
    fn remove_leaf_restores_node_count() {
        let mut t = Tree::new("vol-A");
        t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap();
        assert_eq!(t.len(), 2);
        t.remove("10.0.0.1:vol-A").unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn remove_two_child_node_reparents_right_subtree() {
        let mut t = Tree::new("vol-A");
        t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap();
        t.insert(ok("10.0.0.2:vol-A", "10.0.0.2")).unwrap();
        let c = t.insert(ok("10.0.0.3:vol-A", "10.0.0.3")).unwrap();
        // 10.0.0.1 has two children after a 4th insert fills its right slot
        let d = t.insert(ok("10.0.0.4:vol-A", "10.0.0.4")).unwrap();
        t.remove("10.0.0.1:vol-A").unwrap();
        assert_eq!(t.len(), 4);
        // c (left subtree) comes up, d (right subtree) is grafted beneath it
        assert_eq!(t.node(d).parent, Some(c));
    }

    #[test]
    fn remove_two_child_node_with_pending_leaf_children_does_not_panic() {
        // A's two children can both be pending leaves (queried but never
        // registered): they're not `available()`, so they're invisible to
        // `find_available_slot`, but they still occupy A's child slots.
        // Removing A must not assume the leftward walk reaches an OK node.
        let mut t = Tree::new("vol-A");
        let a = t.insert(ok("a:vol-A", "a")).unwrap();
        t.insert(ok("b:vol-A", "b")).unwrap();
        let c = t.insert(pending("c:vol-A", "c")).unwrap();
        let d = t.insert(pending("d:vol-A", "d")).unwrap();
        assert_eq!(t.node(a).left, Some(c));
        assert_eq!(t.node(a).right, Some(d));

        t.remove("a:vol-A").unwrap();

        assert_eq!(t.len(), 4, "root, b, c, d all survive a's removal");
        assert_eq!(t.node(d).parent, Some(c), "d is grafted under c");
    }

    #[test]
    fn pending_node_removal_drops_its_whole_subtree() {
        // A node only stops being a candidate slot once it goes pending;
        // it can still carry children it acquired while it was OK. Exercise
        // that case directly, the way a still-pending `register` never
        // reverts a node that already gained descendants.
        let mut t = Tree::new("vol-A");
        let h1 = t.insert(ok("h1:vol-A", "h1")).unwrap();
        t.insert(ok("h2:vol-A", "h2")).unwrap();
        let h3 = t.insert(ok("h3:vol-A", "h3")).unwrap();
        assert_eq!(t.node(h1).left, Some(h3));
        t.node_mut(h1).status = Status::Pending;
        t.remove("h1:vol-A").unwrap();
        assert!(!t.contains("h3:vol-A"), "h3 should be evicted with its pending parent");
        assert_eq!(t.len(), 2, "root and h2 remain");
    }

    #[test]
    fn levels_are_recomputed_after_removal() {
        let mut t = Tree::new("vol-A");
        t.insert(ok("10.0.0.1:vol-A", "10.0.0.1")).unwrap();
        t.insert(ok("10.0.0.2:vol-A", "10.0.0.2")).unwrap();
        let c = t.insert(ok("10.0.0.3:vol-A", "10.0.0.3")).unwrap();
        assert_eq!(t.node(c).level, 2);
        t.remove("10.0.0.1:vol-A").unwrap();
        assert_eq!(t.node(c).level, 1);
    }
}
