/*
 * lib.rs
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

//! Divhttp core: a blocking HTTP/HTTPS request manager over an async engine.
//!
//! A [`RequestManager`] is bound to one host, port and scheme. Each call runs as a session on a
//! small worker pool and the calling thread blocks until the [`HttpCallResponse`] is ready.
//! Responses are either buffered in memory or streamed to a file, with gzip bodies decoded.
//!
//! Logging goes through `tracing`; install a subscriber in the host application to see it.

pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod uri;

pub use config::EngineConfig;
pub use error::{ConfigError, HttpError, ReadPart};
pub use protocol::http::{
    HeaderMap, HttpCallResponse, HttpVersion, Method, RequestManager, ResponseBody,
    FAILURE_STATUS,
};
pub use uri::{extract_host, extract_port, is_encrypted, path_from_url, url_encode, Endpoint};
