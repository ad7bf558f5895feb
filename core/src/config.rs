/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Divhttp.
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

//! Engine configuration: reactor size, default timeouts, default headers, user agent, HTTP
//! version, and an optional extra CA bundle. Can be built in code or loaded from a JSON file;
//! missing JSON fields take the defaults below.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::http::{HeaderMap, HttpVersion};

pub const DEFAULT_THREAD_COUNT: usize = 1;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Covers everything from the first byte written to the last body byte read.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn whole_secs(d: Duration) -> u64 {
    d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reactor worker threads shared by all sessions of one manager.
    pub thread_count: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Sent with every request unless the call overrides them.
    pub default_headers: HashMap<String, String>,
    pub user_agent: String,
    /// 10 for HTTP/1.0, 11 for HTTP/1.1.
    pub http_version: u8,
    /// PEM bundle trusted in addition to the system roots.
    pub ca_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_headers: HashMap::new(),
            user_agent: default_user_agent(),
            http_version: 11,
            ca_file: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::Invalid("thread_count must be at least 1".into()));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        HttpVersion::from_code(self.http_version)?;
        Ok(())
    }

    pub fn with_thread_count(mut self, n: usize) -> Self {
        self.thread_count = n;
        self
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version.code();
        self
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Default timeouts, kept in whole seconds. A partial second rounds up.
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout_secs = whole_secs(connect);
        self.request_timeout_secs = whole_secs(request);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_header_map(&self) -> HeaderMap {
        self.default_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.thread_count, 1);
        assert_eq!(c.connect_timeout(), Duration::from_secs(5));
        assert_eq!(c.request_timeout(), Duration::from_secs(120));
        assert!(c.user_agent.starts_with("divhttp_core/"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn json_partial_fields() {
        let c = EngineConfig::from_json_str(
            r#"{"thread_count": 4, "default_headers": {"X-Client": "editor"}, "http_version": 10}"#,
        )
        .unwrap();
        assert_eq!(c.thread_count, 4);
        assert_eq!(c.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(c.default_header_map().get("x-client"), Some("editor"));
        assert_eq!(c.http_version, 10);
    }

    #[test]
    fn json_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"thread_count": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"http_version": 20}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn sub_second_timeouts_round_up() {
        let c = EngineConfig::default()
            .with_timeouts(Duration::from_millis(250), Duration::from_millis(1500));
        assert_eq!(c.connect_timeout(), Duration::from_secs(1));
        assert_eq!(c.request_timeout(), Duration::from_secs(2));
        assert!(c.validate().is_ok());

        let zero = EngineConfig::default().with_timeouts(Duration::ZERO, Duration::from_secs(3));
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"request_timeout_secs": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"connect_timeout_secs": 2}"#).unwrap();
        let c = EngineConfig::load(&path).unwrap();
        assert_eq!(c.connect_timeout(), Duration::from_secs(2));
        assert!(matches!(
            EngineConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
