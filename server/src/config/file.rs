/*
 * Created on Thu Jan 27 2022
 *
 * This file is a part of the source code for the volume-topology tracker
 * Copyright (c) 2022, Sayan Nandan <ohsayan at outlook dot com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! YAML configuration file, the same format and loading convention as
//! `server/src/config/cfgfile.rs` in the source project.

use super::Config;
use crate::topology::Policy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    bind_address: Option<SocketAddr>,
    policy: Option<Policy>,
    heartbeat_expiry_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> libsky::TResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_yaml::from_str(&raw)?;
        Ok(file)
    }

    pub fn apply(&self, cfg: &mut Config) {
        if let Some(bind_address) = self.bind_address {
            cfg.bind_address = bind_address;
        }
        if let Some(policy) = self.policy {
            cfg.policy = policy;
        }
        if let Some(secs) = self.heartbeat_expiry_secs {
            cfg.heartbeat_expiry = std::time::Duration::from_secs(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_file() {
        let yaml = "policy: btree_with_uncle\nheartbeat_expiry_secs: 45\n";
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.policy, Some(Policy::BTreeWithUncle));
        assert_eq!(file.heartbeat_expiry_secs, Some(45));
        assert!(file.bind_address.is_none());
    }
}
