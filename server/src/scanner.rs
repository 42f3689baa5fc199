/*
 * Created on Sun May 16 2021
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

//! The background eviction loop. Started lazily on the engine's first
//! `query` and, barring an explicit shutdown signal (used only by tests),
//! runs for the process lifetime.

use crate::topology::Engine;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time;

/// Capture `now`, evict every host whose heartbeat has lapsed by more
/// than the engine's configured threshold, then sleep for that same
/// threshold before the next pass. The wait-equal-to-threshold cadence
/// bounds eviction latency to at most 2x the threshold.
pub async fn run(engine: Arc<Engine>, mut terminate: broadcast::Receiver<()>) {
    let threshold = engine.heartbeat_expiry();
    log::info!("scanner: started, sweeping every {threshold:?}");
    loop {
        tokio::select! {
            _ = time::sleep(threshold) => {
                engine.evict_expired();
            }
            _ = terminate.recv() => {
                break;
            }
        }
    }
    log::info!("scanner: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Policy;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn scanner_evicts_after_threshold_elapses() {
        let engine = Engine::new(Policy::BTree, Duration::from_millis(50));
        engine.query("vol-A", "10.0.0.1");
        // drives the lazily-started scanner via the real query() path
        time::advance(Duration::from_millis(200)).await;
        // give the spawned task a chance to run its sweeps
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(engine.heartbeat("10.0.0.1").is_empty());
        engine.shutdown();
    }
}
