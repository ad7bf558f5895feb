/*
 * error.rs
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

//! Engine errors.
//!
//! `HttpError` is carried inside every failed `HttpCallResponse`; its `Display` is the message an
//! operator sees. `ConfigError` is only returned while building a request manager.

use std::fmt;
use std::io;

use thiserror::Error;

/// Which part of the response was being read when a read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPart {
    Headers,
    Body,
}

impl fmt::Display for ReadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPart::Headers => write!(f, "headers"),
            ReadPart::Body => write!(f, "body"),
        }
    }
}

/// Per-request failure. Never retried inside the engine.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Resolve error: {message} - {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        message: String,
    },

    /// `timed_out` separates an expired connect window from refusal or unreachable routes.
    #[error("Connect error: {message}")]
    Connect { timed_out: bool, message: String },

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Response {part} read error: {message}")]
    Read { part: ReadPart, message: String },

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("File error: {0}")]
    FileIo(String),

    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    /// The session ended without producing a result (task panic, reactor stopped, misuse).
    #[error("Request aborted: {0}")]
    Aborted(String),
}

impl HttpError {
    pub fn read(part: ReadPart, message: impl Into<String>) -> Self {
        HttpError::Read {
            part,
            message: message.into(),
        }
    }

    /// True when the connect window expired (as opposed to refusal, unreachable host, ...).
    pub fn is_connect_timeout(&self) -> bool {
        matches!(self, HttpError::Connect { timed_out: true, .. })
    }
}

/// Errors raised while constructing a request manager. These are fatal for the manager.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("TLS configuration failed: {0}")]
    Tls(String),

    #[error("failed to start reactor: {0}")]
    Reactor(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}
