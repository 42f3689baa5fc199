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

//! A minimal HTTP/1.x request reader. Frames one request off the wire
//! the same way the source's `dbnet::Connection::get_query_packet` frames
//! one binary protocol frame: a buffered line read for the header block,
//! then a fixed-size body read once `Content-Length` is known.

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

impl Method {
    fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            _ => Method::Other,
        }
    }
}

pub struct Request {
    pub method: Method,
    pub path: String,
    #[allow(dead_code)]
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

#[derive(Debug)]
pub enum ReadError {
    /// The peer closed the connection before sending a request
    Disconnected,
    /// The request line or headers were malformed
    Malformed,
    Io(std::io::Error),
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        ReadError::Io(e)
    }
}

const MAX_HEADER_LINE: usize = 8 * 1024;
const MAX_BODY: usize = 1024 * 1024;

/// Read one HTTP request from `stream`. Connections are not kept alive:
/// the caller closes the socket after writing the response.
pub async fn read_request(stream: &mut TcpStream) -> Result<Request, ReadError> {
    let mut reader = BufReader::new(stream);
    let mut line = String::with_capacity(256);
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ReadError::Disconnected);
    }
    let mut parts = line.trim_end().splitn(3, ' ');
    let method = Method::parse(parts.next().ok_or(ReadError::Malformed)?);
    let path = parts.next().ok_or(ReadError::Malformed)?.to_owned();

    let mut headers = HashMap::new();
    loop {
        let mut header_line = String::with_capacity(128);
        let n = reader.read_line(&mut header_line).await?;
        if n == 0 || header_line.len() > MAX_HEADER_LINE {
            return Err(ReadError::Malformed);
        }
        let trimmed = header_line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse().unwrap_or(0))
        .unwrap_or(0)
        .min(MAX_BODY);

    let mut body = BytesMut::zeroed(content_length);
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(Request {
        method,
        path,
        headers,
        body: body.freeze(),
    })
}
