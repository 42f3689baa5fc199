/*
 * Created on Thu Jul 02 2020
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

//! Errors raised by the topology engine and mapped to HTTP status codes
//! by the adapter in `http`.

use std::fmt;

/// The result type used throughout the topology core
pub type EngineResult<T> = Result<T, Error>;

/// Errors that can occur while running an engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An unknown image, peer or host was referenced
    NotFound,
    /// A peer_id is already bound for a host
    Duplicate,
    /// A required field was missing or a structural precondition was violated
    InvalidParameter(&'static str),
    /// Reserved for an upstream authorization gate; never raised by the core itself
    Forbidden,
    /// Reserved; not currently raised by the core
    Conflict,
}

impl Error {
    /// The HTTP status code this error maps to, per the v1 surface's error table
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Duplicate => 409,
            Self::InvalidParameter(_) => 400,
            Self::Forbidden => 403,
            Self::Conflict => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

impl std::error::Error for Error {}
