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

//! Parent-selection policies.
//!
//! The source has two executor subclasses that only differ in
//! `get_parents_info`. A strategy registry would be overkill for two
//! built-in variants, so this is a plain tagged enum the engine is
//! constructed with once, at startup.

use super::node::{Identity, NodeId};
use super::tree::Tree;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// The direct parent, plus every other node at the parent's depth
    BTree,
    /// The direct parent, plus the parent's sibling (the "uncle"), if any
    BTreeWithUncle,
}

impl Default for Policy {
    fn default() -> Self {
        Policy::BTree
    }
}

impl Policy {
    /// `id`'s parent is already known to be a real (non-root) node;
    /// `parent` is its NodeId.
    pub(super) fn parents(self, tree: &Tree, id: NodeId, parent: NodeId) -> Vec<Identity> {
        match self {
            Policy::BTree => {
                let mut list = vec![tree.node(parent).identity()];
                let level = tree.node(parent).level;
                for peer in tree.nodes_at_level(level) {
                    if peer != parent {
                        list.push(tree.node(peer).identity());
                    }
                }
                list
            }
            Policy::BTreeWithUncle => {
                let mut list = vec![tree.node(parent).identity()];
                if let Some(uncle) = tree.sibling_of(parent) {
                    list.push(tree.node(uncle).identity());
                }
                list
            }
        }
    }
}
