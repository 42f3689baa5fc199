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

//! The accept loop: bind one `TcpListener`, bound concurrent connections
//! with a `Semaphore` and spawn one task per connection, the same shape
//! as the source's `dbnet::tcp::RawListener::run` generalized from its
//! length-prefixed binary frame to one HTTP request/response per socket.

use super::request::{read_request, ReadError};
use super::response::Response;
use super::routes;
use crate::registry;
use crate::topology::Engine;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

const MAX_CONNECTIONS: usize = 256;

pub async fn run(bind_address: SocketAddr, engine: Arc<Engine>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    log::info!("listening on {}", listener.local_addr()?);
    serve(listener, engine).await
}

/// Split out from [`run`] so integration tests can bind an ephemeral
/// port (`127.0.0.1:0`), read back the assigned address, and drive
/// `serve` in a background task.
pub async fn serve(listener: TcpListener, engine: Arc<Engine>) -> std::io::Result<()> {
    let climit = Arc::new(Semaphore::new(MAX_CONNECTIONS));
    loop {
        let permit = climit.clone().acquire_owned().await.unwrap();
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => {
                // a prior accept() failure no longer reflects the
                // listener's current state once a new connection lands
                registry::unpoison();
                pair
            }
            Err(e) => {
                log::error!("accept failed: {e}");
                registry::poison();
                continue;
            }
        };
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, peer_addr, engine).await {
                log::debug!("connection from {peer_addr} ended: {e}");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    engine: Arc<Engine>,
) -> std::io::Result<()> {
    let response = match read_request(&mut stream).await {
        Ok(req) => routes::dispatch(&engine, req, &peer_addr.ip().to_string()).await,
        Err(ReadError::Disconnected) => return Ok(()),
        Err(ReadError::Malformed) => Response::empty(400),
        Err(ReadError::Io(e)) => return Err(e),
    };
    stream.write_all(&response.into_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
