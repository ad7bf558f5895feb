/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or read
//! until close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

use crate::protocol::http::HeaderMap;

/// Callback for HTTP/1.1 response events. The session implements this to collect the response.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn end_body(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Response complete.
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the caller must call set_body_mode() before feeding more bytes.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkTrailer,
}

/// How the body after the header block is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Length(u64),
    Chunked,
    UntilClose,
}

/// Decide body framing from the status and headers. 1xx, 204 and 304 never carry a body.
pub fn body_framing(status: u16, headers: &HeaderMap) -> io::Result<BodyFraming> {
    if (100..200).contains(&status) || status == 204 || status == 304 {
        return Ok(BodyFraming::Length(0));
    }
    if let Some(te) = headers.get("transfer-encoding") {
        if te.to_ascii_lowercase().contains("chunked") {
            return Ok(BodyFraming::Chunked);
        }
    }
    match headers.get("content-length") {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(BodyFraming::Length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid Content-Length")),
        None => Ok(BodyFraming::UntilClose),
    }
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; handler is invoked as
/// complete tokens are parsed.
pub struct ResponseParser {
    state: ParseState,
    /// Content-Length when known (-1 for chunked or read-until-close).
    content_length: i64,
    bytes_received: i64,
    chunk_remaining: u64,
    /// Bytes of status line and header block consumed so far, CRLFs included.
    head_bytes: usize,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            content_length: -1,
            bytes_received: 0,
            chunk_remaining: 0,
            head_bytes: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Idle
    }

    /// True while the body is delimited only by the peer closing the connection.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::Body && self.content_length < 0
    }

    /// Size of the response head consumed so far.
    pub fn head_len(&self) -> usize {
        self.head_bytes
    }

    /// Start over at a new status line, e.g. after an interim 1xx response.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Offset of the first CRLF, if any.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    fn invalid(msg: &str) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
    }

    fn split_header(line: &str) -> Option<(&str, &str)> {
        let colon = line.find(':')?;
        Some((line[..colon].trim(), line[colon + 1..].trim()))
    }

    /// Consume and parse as much as possible from buf. Partial tokens stay in buf.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> Result<(), io::Error> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    self.head_bytes += line.len();
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| Self::invalid("invalid status line UTF-8"))?;
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    let mut parts = line_str.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(Self::invalid("malformed status line"));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .filter(|c| (100..1000).contains(c))
                        .ok_or_else(|| Self::invalid("malformed status code"))?;
                    handler.status(code, parts.next());
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.head_bytes += 2;
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = buf.split_to(line_end + 2);
                    self.head_bytes += line.len();
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| Self::invalid("invalid header UTF-8"))?;
                    if let Some((name, value)) = Self::split_header(line_str) {
                        handler.header(name, value);
                    }
                }
                ParseState::HeadersComplete => return Ok(()),
                ParseState::Body => {
                    if self.content_length >= 0 {
                        let remaining = (self.content_length - self.bytes_received) as usize;
                        let to_read = remaining.min(buf.len());
                        if to_read > 0 {
                            let chunk = buf.split_to(to_read);
                            handler.body_chunk(&chunk);
                            self.bytes_received += to_read as i64;
                        }
                        if self.bytes_received >= self.content_length {
                            self.finish_body(handler);
                        }
                    } else {
                        let chunk = buf.split();
                        handler.body_chunk(&chunk);
                        return Ok(());
                    }
                }
                ParseState::ChunkSize => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| Self::invalid("invalid chunk size"))?;
                    let hex_part = line_str.split(';').next().unwrap_or(line_str).trim();
                    self.chunk_remaining = u64::from_str_radix(hex_part, 16)
                        .map_err(|_| Self::invalid("invalid chunk size"))?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if self.chunk_remaining > 0 {
                        let to_read = (self.chunk_remaining.min(buf.len() as u64)) as usize;
                        let chunk = buf.split_to(to_read);
                        handler.body_chunk(&chunk);
                        self.chunk_remaining -= to_read as u64;
                    }
                    if self.chunk_remaining > 0 || buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(Self::invalid("missing CRLF after chunk"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.finish_body(handler);
                    } else {
                        let line = buf.split_to(line_end + 2);
                        let line_str = std::str::from_utf8(&line[..line_end])
                            .map_err(|_| Self::invalid("invalid trailer"))?;
                        if let Some((name, value)) = Self::split_header(line_str) {
                            handler.trailer(name, value);
                        }
                    }
                }
                ParseState::Idle => return Ok(()),
            }
        }
        Ok(())
    }

    fn finish_body<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        handler.end_body();
        handler.complete();
        self.state = ParseState::Idle;
    }

    /// Called after headers are received (state HeadersComplete).
    pub fn set_body_mode(&mut self, framing: BodyFraming) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.bytes_received = 0;
        match framing {
            BodyFraming::Chunked => {
                self.content_length = -1;
                self.state = ParseState::ChunkSize;
            }
            BodyFraming::Length(0) => {
                self.content_length = 0;
                self.state = ParseState::Idle;
            }
            BodyFraming::Length(n) => {
                self.content_length = n as i64;
                self.state = ParseState::Body;
            }
            BodyFraming::UntilClose => {
                self.content_length = -1;
                self.state = ParseState::Body;
            }
        }
    }

    /// The peer closed the connection. Completes a read-until-close body; anything else
    /// unfinished is a truncated message.
    pub fn end_of_stream<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::Idle => Ok(()),
            ParseState::Body if self.content_length < 0 => {
                self.finish_body(handler);
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the response was complete",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<u16>,
        headers: HeaderMap,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
        completed: bool,
    }

    impl H1ResponseHandler for Recorder {
        fn status(&mut self, code: u16, _reason: Option<&str>) {
            self.status = Some(code);
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.insert(name, value);
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn end_body(&mut self) {}
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.to_string(), value.to_string()));
        }
        fn complete(&mut self) {
            self.completed = true;
        }
    }

    /// Feed `input` in pieces of `step` bytes, switching to body mode at the header boundary.
    fn parse_in_steps(input: &[u8], step: usize) -> (ResponseParser, Recorder) {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::new();
        for piece in input.chunks(step) {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut rec).unwrap();
            if parser.state() == ParseState::HeadersComplete {
                let framing = body_framing(rec.status.unwrap(), &rec.headers).unwrap();
                parser.set_body_mode(framing);
                parser.receive(&mut buf, &mut rec).unwrap();
            }
        }
        (parser, rec)
    }

    #[test]
    fn content_length_body() {
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\nContent-Type: application/json\r\n\r\n{\"ok\":true}";
        for step in [1, 3, input.len()] {
            let (parser, rec) = parse_in_steps(input, step);
            assert!(parser.is_complete());
            assert!(rec.completed);
            assert_eq!(rec.status, Some(200));
            assert_eq!(rec.body, b"{\"ok\":true}");
            assert_eq!(rec.headers.get("content-type"), Some("application/json"));
        }
    }

    #[test]
    fn chunked_body_with_trailer() {
        let input = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Checksum: abc\r\n\r\n";
        for step in [1, 7, input.len()] {
            let (parser, rec) = parse_in_steps(input, step);
            assert!(parser.is_complete());
            assert_eq!(rec.body, b"hello world");
            assert_eq!(rec.trailers, vec![("X-Checksum".to_string(), "abc".to_string())]);
        }
    }

    #[test]
    fn no_content_completes_at_headers() {
        let (parser, rec) = parse_in_steps(b"HTTP/1.1 204 No Content\r\nX-Redirect: /a\r\n\r\n", 4);
        assert!(parser.is_complete());
        assert_eq!(rec.status, Some(204));
        assert!(rec.body.is_empty());
    }

    #[test]
    fn until_close_body_finished_by_eof() {
        let (mut parser, mut rec) = parse_in_steps(b"HTTP/1.0 200 OK\r\n\r\nabc", 2);
        assert!(parser.reads_until_close());
        parser.end_of_stream(&mut rec).unwrap();
        assert!(parser.is_complete());
        assert_eq!(rec.body, b"abc");
    }

    #[test]
    fn eof_inside_length_body_is_error() {
        let (mut parser, mut rec) =
            parse_in_steps(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc", 64);
        let err = parser.end_of_stream(&mut rec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn head_length_counts_every_line() {
        let head = b"HTTP/1.1 200 OK\r\nA: 1\r\nBb: 22\r\n\r\n";
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::new();
        for piece in head.chunks(5) {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut rec).unwrap();
        }
        assert_eq!(parser.state(), ParseState::HeadersComplete);
        assert_eq!(parser.head_len(), head.len());
        parser.reset();
        assert_eq!(parser.head_len(), 0);
        assert_eq!(parser.state(), ParseState::StatusLine);
    }

    #[test]
    fn malformed_input_rejected() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(parser.receive(&mut buf, &mut rec).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("Content-Length", "ten");
        assert!(body_framing(200, &headers).is_err());
    }

    #[test]
    fn bad_chunk_size_rejected() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyFraming::Chunked);
        buf.extend_from_slice(b"zz\r\n");
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }
}
