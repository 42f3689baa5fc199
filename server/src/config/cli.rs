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

use super::Config;
use crate::topology::Policy;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "voltd", about = "Volume-topology tracker")]
pub struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to bind the HTTP surface to
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Parent-selection policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,
    /// Seconds of silence after which a host is evicted
    #[arg(long)]
    pub heartbeat_expiry_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PolicyArg {
    Btree,
    BtreeWithUncle,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Btree => Policy::BTree,
            PolicyArg::BtreeWithUncle => Policy::BTreeWithUncle,
        }
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn apply(&self, cfg: &mut Config) -> libsky::TResult<()> {
        if let Some(bind) = self.bind {
            cfg.bind_address = bind;
        }
        if let Some(policy) = self.policy {
            cfg.policy = policy.into();
        }
        if let Some(secs) = self.heartbeat_expiry_secs {
            cfg.heartbeat_expiry = std::time::Duration::from_secs(secs);
        }
        Ok(())
    }
}
