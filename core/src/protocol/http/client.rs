/*
 * client.rs
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

//! Blocking request manager: bound to one host, port and scheme at construction, it builds a
//! request per call, runs it as a session on its reactor, and blocks the caller until the result
//! is in.
//!
//! Calls must come from ordinary threads. A call made on an async runtime thread fails instead
//! of blocking that thread.

use std::path::Path;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::EngineConfig;
use crate::error::{ConfigError, HttpError};
use crate::net;
use crate::protocol::http::reactor::Reactor;
use crate::protocol::http::request::{HttpVersion, Method, Request};
use crate::protocol::http::response::HttpCallResponse;
use crate::protocol::http::session::{ResponseMode, Session, Target};
use crate::protocol::http::HeaderMap;
use crate::uri::{request_target, Endpoint};

const DOWNLOAD_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
/// Only gzip can be decoded, so only gzip is offered.
const DOWNLOAD_ACCEPT_ENCODING: &str = "gzip, identity";
const DOWNLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Headers every download starts from; engine defaults and call headers override them.
fn download_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Accept", DOWNLOAD_ACCEPT);
    headers.insert("Accept-Encoding", DOWNLOAD_ACCEPT_ENCODING);
    headers
}

pub struct RequestManager {
    target: Target,
    user_agent: String,
    default_headers: HeaderMap,
    connect_timeout: Duration,
    request_timeout: Duration,
    reactor: Reactor,
}

impl RequestManager {
    /// Manager for the scheme, host and port of `base_url`.
    pub fn from_url(base_url: &str, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_config(Endpoint::parse(base_url)?, config)
    }

    pub fn new(
        host: impl Into<String>,
        port: u16,
        use_tls: bool,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_config(Endpoint::new(host, port, use_tls), config)
    }

    /// Build the TLS context (for HTTPS endpoints) and start the reactor.
    pub fn with_config(endpoint: Endpoint, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if endpoint.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        let version = HttpVersion::from_code(config.http_version)?;
        let tls = if endpoint.use_tls {
            Some(net::tls_connector(config.ca_file.as_deref())?)
        } else {
            None
        };
        let reactor = Reactor::new();
        reactor.start(config.thread_count)?;
        tracing::info!(
            host = %endpoint.host,
            port = endpoint.port,
            tls = endpoint.use_tls,
            "request manager ready"
        );
        Ok(Self {
            target: Target {
                endpoint,
                version,
                tls,
            },
            user_agent: config.user_agent.clone(),
            default_headers: config.default_header_map(),
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
            reactor,
        })
    }

    pub fn host(&self) -> &str {
        &self.target.endpoint.host
    }

    pub fn port(&self) -> u16 {
        self.target.endpoint.port
    }

    pub fn uses_tls(&self) -> bool {
        self.target.endpoint.use_tls
    }

    pub fn http_version(&self) -> HttpVersion {
        self.target.version
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Replace the headers sent with every request.
    pub fn set_default_headers(&mut self, headers: HeaderMap) {
        self.default_headers = headers;
    }

    /// Timeouts from the configuration, for callers that have no per-call preference.
    pub fn default_timeouts(&self) -> (Duration, Duration) {
        (self.connect_timeout, self.request_timeout)
    }

    /// Send a request and return the whole (gzip-decoded) body in memory.
    ///
    /// `url` is the path and query on this manager's host. Call headers override the defaults.
    /// The body is only sent for POST and PUT.
    #[allow(clippy::too_many_arguments)]
    pub fn send_request(
        &self,
        url: &str,
        method: Method,
        token: &str,
        content_type: &str,
        body: &[u8],
        headers: &HeaderMap,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> HttpCallResponse {
        let mut merged = self.default_headers.clone();
        merged.merge(headers);
        let request = self.build_request(url, method, token, content_type, body, &merged);
        self.execute(request, ResponseMode::Buffered, connect_timeout, request_timeout)
    }

    /// GET `url` into `output_path`, decoding a gzip body on the way. The result carries the
    /// output path on success; on failure no partial output is left behind.
    pub fn download_file_from_url(
        &self,
        output_path: impl AsRef<Path>,
        url: &str,
        token: &str,
        headers: &HeaderMap,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> HttpCallResponse {
        let mut merged = download_headers();
        merged.merge(&self.default_headers);
        merged.merge(headers);
        let request =
            self.build_request(url, Method::Get, token, DOWNLOAD_CONTENT_TYPE, &[], &merged);
        let mode = ResponseMode::File(output_path.as_ref().to_path_buf());
        self.execute(request, mode, connect_timeout, request_timeout)
    }

    fn build_request(
        &self,
        url: &str,
        method: Method,
        token: &str,
        content_type: &str,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Request {
        let mut request = Request::new(method, request_target(url));
        request
            .header("Host", self.target.endpoint.host_header())
            .header("User-Agent", self.user_agent.as_str());
        if !content_type.is_empty() {
            request.header("Content-Type", content_type);
        }
        request.bearer(token);
        for (name, value) in headers.iter() {
            request.header(name, value);
        }
        if method.sends_body() {
            request.body(body.to_vec());
        }
        request
    }

    fn execute(
        &self,
        request: Request,
        mode: ResponseMode,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> HttpCallResponse {
        if Handle::try_current().is_ok() {
            tracing::error!(url = %request.target, "blocking request made from an async runtime thread");
            return HttpCallResponse::failure(HttpError::Aborted(
                "blocking request made from an async runtime thread".to_string(),
            ));
        }
        tracing::debug!(method = request.method.as_str(), url = %request.target, "sending request");
        let session = Session::new(self.target.clone(), connect_timeout, request_timeout, mode);
        match self.reactor.submit(session.run(request)).blocking_recv() {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => HttpCallResponse::failure(e),
            Err(_) => HttpCallResponse::failure(HttpError::Aborted(
                "session ended without a result".to_string(),
            )),
        }
    }
}
