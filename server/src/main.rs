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

//! # voltd
//!
//! Tracks the binary-tree fan-out topology of iSCSI-shared disk images
//! across a compute fleet. See the `topology` module for the engine
//! that owns this state and `http` for the surface clients talk to.

use env_logger::Builder;
use libsky::util::terminal;
use libsky::{URL, VERSION};
use std::env;
use tokio::signal;
use voltd::config;
use voltd::http;
use voltd::topology::Engine;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    Builder::new()
        .parse_filters(&env::var("VOLT_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("startup failure: {e}");
            std::process::exit(0x100);
        }
    };

    println!("voltd v{VERSION} | {URL}");
    log::info!("starting with policy {:?}", cfg.policy);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("voltd")
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let engine = Engine::new(cfg.policy, cfg.heartbeat_expiry);
        tokio::select! {
            result = http::run(cfg.bind_address, engine) => {
                if let Err(e) = result {
                    log::error!("server exited with error: {e}");
                }
            }
            _ = signal::ctrl_c() => {
                log::info!("received shutdown signal");
            }
        }
    });
    drop(runtime);

    terminal::write_info("Goodbye :)\n").unwrap();
}
