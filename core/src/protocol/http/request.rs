/*
 * request.rs
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

//! HTTP request: method, target, headers, optional body.
//!
//! Built fresh for every call by the request manager and handed to a session, which serializes it
//! with `encode`.

use bytes::{BufMut, BytesMut};

use crate::error::ConfigError;
use crate::protocol::http::HeaderMap;
use crate::uri::escape_target;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Only POST and PUT carry a body.
    pub fn sends_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

/// Protocol version written on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    Http1_0,
    #[default]
    Http1_1,
}

impl HttpVersion {
    /// 10 or 11, the numeric form used in configuration.
    pub fn from_code(code: u8) -> Result<Self, ConfigError> {
        match code {
            10 => Ok(HttpVersion::Http1_0),
            11 => Ok(HttpVersion::Http1_1),
            other => Err(ConfigError::Invalid(format!(
                "unsupported HTTP version {}",
                other
            ))),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            HttpVersion::Http1_0 => 10,
            HttpVersion::Http1_1 => 11,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http1_0 => "HTTP/1.0",
            HttpVersion::Http1_1 => "HTTP/1.1",
        }
    }
}

/// One request as sent on the wire.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Encoded path and query. Host and port belong to the manager.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Add or replace a header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Set `Authorization: Bearer <token>`. An empty token leaves the header unset.
    pub fn bearer(&mut self, token: &str) -> &mut Self {
        if !token.is_empty() {
            self.headers.insert("Authorization", format!("Bearer {}", token));
        }
        self
    }

    pub fn body(&mut self, data: Vec<u8>) -> &mut Self {
        self.body = Some(data);
        self
    }

    /// Serialize the request. A body is always framed with Content-Length; any caller-supplied
    /// framing headers are replaced.
    pub fn encode(&self, version: HttpVersion) -> BytesMut {
        let body_len = self.body.as_ref().map(|b| b.len()).unwrap_or(0);
        let mut out = BytesMut::with_capacity(256 + body_len);
        out.put_slice(self.method.as_str().as_bytes());
        out.put_u8(b' ');
        out.put_slice(escape_target(&self.target).as_bytes());
        out.put_u8(b' ');
        out.put_slice(version.as_str().as_bytes());
        out.put_slice(b"\r\n");
        for (name, value) in self.headers.iter() {
            if self.body.is_some()
                && (name.eq_ignore_ascii_case("content-length")
                    || name.eq_ignore_ascii_case("transfer-encoding"))
            {
                continue;
            }
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        if let Some(body) = &self.body {
            out.put_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
            out.put_slice(body);
        } else {
            out.put_slice(b"\r\n");
        }
        out
    }
}
