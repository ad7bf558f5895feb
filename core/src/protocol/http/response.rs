/*
 * response.rs
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

//! Result of one call: status, headers, and either the payload or the error.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::HttpError;
use crate::protocol::http::HeaderMap;

/// Status reported for every failed call.
pub const FAILURE_STATUS: u16 = 500;

/// Where the payload of a successful call ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Buffered mode: the (decoded) body.
    Content(Bytes),
    /// Streamed-file mode: the output file, written and closed.
    File(PathBuf),
}

/// Outcome of `send_request` / `download_file_from_url`.
///
/// A transport-level success carries whatever status the server sent (including 4xx/5xx); the
/// caller decides what a status means. A failure always reports `FAILURE_STATUS` and keeps any
/// headers that had already been read.
#[derive(Debug)]
pub struct HttpCallResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub outcome: Result<ResponseBody, HttpError>,
}

impl HttpCallResponse {
    pub fn success(status: u16, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            outcome: Ok(body),
        }
    }

    pub fn failure(error: HttpError) -> Self {
        Self::failure_with_headers(error, HeaderMap::new())
    }

    pub fn failure_with_headers(error: HttpError, headers: HeaderMap) -> Self {
        Self {
            status: FAILURE_STATUS,
            headers,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Raw content bytes (buffered mode only).
    pub fn content(&self) -> Option<&[u8]> {
        match &self.outcome {
            Ok(ResponseBody::Content(b)) => Some(b),
            _ => None,
        }
    }

    /// Content as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.content().map(String::from_utf8_lossy)
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            Ok(ResponseBody::File(p)) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&HttpError> {
        self.outcome.as_ref().err()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }
}
