/*
 * session.rs
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

//! One request/response exchange, start to finish.
//!
//! Phases run strictly in order:
//! Idle → Resolving → Connecting → [Handshaking] → Writing → ReadingHeaders → ReadingBody →
//! [Decompressing] → ShuttingDown → Done.
//!
//! Resolving, connecting and the TLS handshake share the connect timeout. Writing through the
//! last body byte shares the request timeout. Once a connection exists, ShuttingDown runs on every
//! path, success or failure, and never changes the outcome.
//!
//! The session is owned by the task that runs it; the task ends after `run` returns its result.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::lookup_host;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;

use crate::error::{HttpError, ReadPart};
use crate::protocol::http::connection::{is_benign_close, Expiry, HttpStream};
use crate::protocol::http::decompress::{self, Compression};
use crate::protocol::http::h1::{body_framing, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::{HttpVersion, Request};
use crate::protocol::http::response::{HttpCallResponse, ResponseBody};
use crate::protocol::http::HeaderMap;
use crate::uri::Endpoint;

const READ_CHUNK: usize = 8192;
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Where every session of one manager connects. Fixed at manager construction.
#[derive(Clone)]
pub struct Target {
    pub endpoint: Endpoint,
    pub version: HttpVersion,
    /// Present for HTTPS managers.
    pub tls: Option<TlsConnector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Connecting,
    Handshaking,
    Writing,
    ReadingHeaders,
    ReadingBody,
    Decompressing,
    ShuttingDown,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Resolving => "resolve",
            Phase::Connecting => "connect",
            Phase::Handshaking => "handshake",
            Phase::Writing => "write",
            Phase::ReadingHeaders => "header read",
            Phase::ReadingBody => "body read",
            Phase::Decompressing => "decompression",
            Phase::ShuttingDown => "shutdown",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// How the response is delivered. Fixed when the session is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    /// Whole body in memory.
    Buffered,
    /// Body streamed to this file (via a temp file beside it).
    File(PathBuf),
}

/// Collects parser events for the response being read.
#[derive(Default)]
struct Collector {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
}

impl H1ResponseHandler for Collector {
    fn status(&mut self, code: u16, _reason: Option<&str>) {
        self.status = code;
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.insert(name, value);
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn end_body(&mut self) {}

    fn trailer(&mut self, name: &str, value: &str) {
        self.headers.insert(name, value);
    }

    fn complete(&mut self) {}
}

pub struct Session {
    target: Target,
    connect_timeout: Duration,
    request_timeout: Duration,
    mode: ResponseMode,
    phase: Phase,
    started: Instant,
    expiry: Expiry,
    /// Request path, kept for diagnostics.
    request_target: String,
    read_buf: BytesMut,
    parser: ResponseParser,
    response: Collector,
    compression: Compression,
}

fn resolve_error(endpoint: &Endpoint, message: String) -> HttpError {
    HttpError::Resolve {
        host: endpoint.host.clone(),
        port: endpoint.port,
        message,
    }
}

/// 1xx responses that precede the final one. 101 ends the exchange since no upgrade is offered.
fn is_interim(status: u16) -> bool {
    (100..200).contains(&status) && status != 101
}

async fn write_request<S: AsyncWrite + Unpin>(stream: &mut S, wire: &[u8]) -> io::Result<()> {
    stream.write_all(wire).await?;
    stream.flush().await
}

impl Session {
    pub fn new(
        target: Target,
        connect_timeout: Duration,
        request_timeout: Duration,
        mode: ResponseMode,
    ) -> Self {
        Self {
            target,
            connect_timeout,
            request_timeout,
            mode,
            phase: Phase::Idle,
            started: Instant::now(),
            expiry: Expiry::new(),
            request_target: String::new(),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            parser: ResponseParser::new(),
            response: Collector::default(),
            compression: Compression::None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drive the whole exchange and produce the call result.
    pub async fn run(mut self, request: Request) -> HttpCallResponse {
        self.started = Instant::now();
        self.request_target = request.target.clone();
        let mut stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => return self.finish(Err(e)),
        };
        let outcome = self.exchange(&mut stream, &request).await;
        self.shutdown(&mut stream).await;
        self.finish(outcome)
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(url = %self.request_target, "{} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Log a timeout in the current phase and return the message for the error.
    fn log_timeout(&self) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        tracing::error!(
            url = %self.request_target,
            phase = %self.phase,
            elapsed_secs = elapsed,
            "call to url {} timed out after {:.1} seconds",
            self.request_target,
            elapsed
        );
        format!("{} timed out after {:.1} seconds", self.phase, elapsed)
    }

    async fn open(&mut self) -> Result<HttpStream, HttpError> {
        let endpoint = self.target.endpoint.clone();
        self.enter(Phase::Resolving);
        self.expiry.expires_after(self.connect_timeout);
        let addrs: Vec<SocketAddr> = match self.expiry.run(lookup_host(endpoint.authority())).await {
            Ok(Ok(addrs)) => addrs.collect(),
            Ok(Err(e)) => return Err(resolve_error(&endpoint, e.to_string())),
            Err(_) => return Err(resolve_error(&endpoint, self.log_timeout())),
        };
        if addrs.is_empty() {
            return Err(resolve_error(&endpoint, "no addresses found".to_string()));
        }

        self.enter(Phase::Connecting);
        let tcp = match self.expiry.run(HttpStream::connect(&addrs)).await {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(e)) => {
                return Err(HttpError::Connect {
                    timed_out: false,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(HttpError::Connect {
                    timed_out: true,
                    message: self.log_timeout(),
                })
            }
        };

        let connector = match &self.target.tls {
            None => return Ok(HttpStream::Plain(tcp)),
            Some(c) => c.clone(),
        };
        self.enter(Phase::Handshaking);
        match self
            .expiry
            .run(HttpStream::handshake(&connector, &endpoint.host, tcp))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(HttpError::Handshake(e.to_string())),
            Err(_) => Err(HttpError::Handshake(self.log_timeout())),
        }
    }

    /// Write the request and read the response on an established stream.
    async fn exchange<S>(&mut self, stream: &mut S, request: &Request) -> Result<ResponseBody, HttpError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.enter(Phase::Writing);
        self.expiry.expires_after(self.request_timeout);
        let wire = request.encode(self.target.version);
        match self.expiry.run(write_request(stream, &wire)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(HttpError::Write(e.to_string())),
            Err(_) => return Err(HttpError::Write(self.log_timeout())),
        }
        match self.mode.clone() {
            ResponseMode::Buffered => self.read_buffered(stream).await,
            ResponseMode::File(output) => self.read_to_file(stream, &output).await,
        }
    }

    /// Read more bytes into the parse buffer. Ok(0) means the peer closed.
    async fn fill<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
        part: ReadPart,
    ) -> Result<usize, HttpError> {
        self.read_buf.reserve(READ_CHUNK);
        match self.expiry.run(stream.read_buf(&mut self.read_buf)).await {
            Ok(Ok(n)) => Ok(n),
            // TLS peer closed without close_notify; the body ends at the close anyway.
            Ok(Err(e))
                if e.kind() == io::ErrorKind::UnexpectedEof && self.parser.reads_until_close() =>
            {
                Ok(0)
            }
            Ok(Err(e)) => Err(HttpError::read(part, e.to_string())),
            Err(_) => Err(HttpError::read(part, self.log_timeout())),
        }
    }

    fn feed(&mut self, part: ReadPart) -> Result<(), HttpError> {
        self.parser
            .receive(&mut self.read_buf, &mut self.response)
            .map_err(|e| HttpError::read(part, e.to_string()))
    }

    /// Read the response head. Interim 1xx responses (other than 101) are skipped; their lines
    /// count toward the header size limit.
    async fn read_headers<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<(), HttpError> {
        self.enter(Phase::ReadingHeaders);
        let mut interim_bytes = 0usize;
        loop {
            self.feed(ReadPart::Headers)?;
            let complete = self.parser.state() == ParseState::HeadersComplete;
            // An unfinished line still waiting for its CRLF counts too.
            let pending = if complete { 0 } else { self.read_buf.len() };
            let head_len = interim_bytes + self.parser.head_len();
            if head_len + pending > MAX_HEADER_BYTES {
                return Err(HttpError::read(ReadPart::Headers, "response header block too large"));
            }
            if complete {
                if !is_interim(self.response.status) {
                    break;
                }
                tracing::debug!(url = %self.request_target, status = self.response.status, "skipping interim response");
                interim_bytes = head_len;
                self.parser.reset();
                self.response = Collector::default();
                continue;
            }
            if self.fill(stream, ReadPart::Headers).await? == 0 {
                return Err(HttpError::read(
                    ReadPart::Headers,
                    "connection closed before response headers",
                ));
            }
        }
        let framing = body_framing(self.response.status, &self.response.headers)
            .map_err(|e| HttpError::read(ReadPart::Headers, e.to_string()))?;
        self.parser.set_body_mode(framing);
        Ok(())
    }

    /// Read the body to completion. With a sink, body bytes go to the file as they arrive and
    /// the count written is returned.
    async fn read_body<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
        mut sink: Option<&mut File>,
    ) -> Result<u64, HttpError> {
        self.enter(Phase::ReadingBody);
        let mut written = 0u64;
        loop {
            self.feed(ReadPart::Body)?;
            if let Some(file) = sink.as_deref_mut() {
                written += self.drain_to(file).await?;
            }
            if self.parser.is_complete() {
                break;
            }
            if self.fill(stream, ReadPart::Body).await? == 0 {
                self.parser
                    .end_of_stream(&mut self.response)
                    .map_err(|e| HttpError::read(ReadPart::Body, e.to_string()))?;
                break;
            }
        }
        Ok(written)
    }

    async fn drain_to(&mut self, file: &mut File) -> Result<u64, HttpError> {
        if self.response.body.is_empty() {
            return Ok(0);
        }
        let chunk = self.response.body.split();
        file.write_all(&chunk)
            .await
            .map_err(|e| HttpError::FileIo(format!("write to download file failed: {}", e)))?;
        Ok(chunk.len() as u64)
    }

    async fn read_buffered<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
    ) -> Result<ResponseBody, HttpError> {
        self.read_headers(stream).await?;
        self.read_body(stream, None).await?;
        let raw = self.response.body.split().freeze();
        // Only gzip is decoded here; any other encoding is handed back as received.
        let gzip = self
            .response
            .headers
            .get("content-encoding")
            .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);
        if !gzip {
            return Ok(ResponseBody::Content(raw));
        }
        self.compression = Compression::Gzip;
        self.enter(Phase::Decompressing);
        let decoded = tokio::task::spawn_blocking(move || decompress::gunzip_bytes(&raw))
            .await
            .map_err(|e| HttpError::Decompression(format!("decompression task failed: {}", e)))??;
        Ok(ResponseBody::Content(Bytes::from(decoded)))
    }

    async fn read_to_file<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
        output: &Path,
    ) -> Result<ResponseBody, HttpError> {
        self.read_headers(stream).await?;
        self.compression =
            Compression::from_content_encoding(self.response.headers.get("content-encoding"))
                .map_err(HttpError::UnsupportedEncoding)?;

        let temp = decompress::temp_path_for(output);
        if let Err(e) = self.receive_into(stream, &temp).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        match self.compression {
            Compression::Gzip => {
                self.enter(Phase::Decompressing);
                let (src, dst) = (temp.clone(), output.to_path_buf());
                let joined =
                    tokio::task::spawn_blocking(move || decompress::gunzip_file(&src, &dst)).await;
                let written = match joined {
                    Ok(result) => result?,
                    Err(e) => {
                        let _ = tokio::fs::remove_file(&temp).await;
                        return Err(HttpError::Decompression(format!(
                            "decompression task failed: {}",
                            e
                        )));
                    }
                };
                tracing::info!("decompressed {} bytes to {}", written, output.display());
            }
            Compression::None => {
                if let Err(e) = tokio::fs::rename(&temp, output).await {
                    let _ = tokio::fs::remove_file(&temp).await;
                    return Err(HttpError::FileIo(format!(
                        "failed to rename {} to {}: {}",
                        temp.display(),
                        output.display(),
                        e
                    )));
                }
            }
        }
        Ok(ResponseBody::File(output.to_path_buf()))
    }

    /// Stream the raw body into `temp`, fully flushed to disk.
    async fn receive_into<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
        temp: &Path,
    ) -> Result<u64, HttpError> {
        let file_error =
            |e: io::Error| HttpError::FileIo(format!("failed opening output file {}: {}", temp.display(), e));
        let mut file = File::create(temp).await.map_err(file_error)?;
        let written = self.read_body(stream, Some(&mut file)).await?;
        file.flush().await.map_err(file_error)?;
        file.sync_all().await.map_err(file_error)?;
        Ok(written)
    }

    async fn shutdown(&mut self, stream: &mut HttpStream) {
        self.enter(Phase::ShuttingDown);
        self.expiry.expires_after(self.request_timeout);
        match self.expiry.run(stream.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if is_benign_close(&e) => {
                tracing::debug!(tls = stream.is_tls(), "ignoring close outcome: {}", e)
            }
            Ok(Err(e)) => tracing::warn!(tls = stream.is_tls(), "socket shutdown failed: {}", e),
            Err(_) => {
                self.log_timeout();
            }
        }
    }

    fn finish(&mut self, outcome: Result<ResponseBody, HttpError>) -> HttpCallResponse {
        self.enter(Phase::Done);
        let headers = std::mem::take(&mut self.response.headers);
        match outcome {
            Ok(body) => HttpCallResponse::success(self.response.status, headers, body),
            Err(e) => {
                tracing::debug!(url = %self.request_target, "request failed: {}", e);
                HttpCallResponse::failure_with_headers(e, headers)
            }
        }
    }
}
