/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Divhttp, an HTTP client engine.
 *
 * Divhttp is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Divhttp is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Divhttp.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP/1.x client engine.
//!
//! - `RequestManager` is the blocking front end; everything below it is async.
//! - One `Session` per call, run as a task on the manager's `Reactor`.
//! - Buffers: `bytes` crate (BytesMut for the parse buffer, Bytes for buffered bodies).
//! - HTTP/1.1: push parser in `h1`; plain TCP or TLS (rustls) streams in `connection`.
//! - Gzip bodies are decoded in memory or file to file by `decompress`.

mod headers;
mod request;
mod response;

pub mod client;
pub mod connection;
pub mod decompress;
pub mod h1;
pub mod reactor;
pub mod session;

pub use client::RequestManager;
pub use connection::HttpStream;
pub use headers::HeaderMap;
pub use reactor::Reactor;
pub use request::{HttpVersion, Method, Request};
pub use response::{HttpCallResponse, ResponseBody, FAILURE_STATUS};
pub use session::{Phase, ResponseMode, Session};
