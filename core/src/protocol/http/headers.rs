/*
 * headers.rs
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

//! Header map: names compare case-insensitively, the last write for a name wins.
//!
//! Used for engine defaults, per-call headers, and response headers. CR and LF are stripped from
//! names and values on insert so a header can never split the request.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    /// Lowercased name -> (name as given, value).
    entries: HashMap<String, (String, String)>,
}

fn strip_line_breaks(s: &str) -> String {
    s.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a header. Returns the previous value for the name, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = strip_line_breaks(&name.into());
        let value = strip_line_breaks(&value.into());
        let key = name.to_ascii_lowercase();
        self.entries.insert(key, (name, value)).map(|(_, v)| v)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate as (name, value). Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Copy every header of `other` into self; `other` wins on conflicts.
    pub fn merge(&mut self, other: &HeaderMap) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V> Extend<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl From<HashMap<String, String>> for HeaderMap {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = HeaderMap::new();
        h.insert("Content-Encoding", "gzip");
        assert_eq!(h.get("content-encoding"), Some("gzip"));
        assert!(h.contains("CONTENT-ENCODING"));
    }

    #[test]
    fn last_write_wins_across_case() {
        let mut h = HeaderMap::new();
        h.insert("Accept", "a");
        let prev = h.insert("accept", "b");
        assert_eq!(prev.as_deref(), Some("a"));
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("Accept"), Some("b"));
        let (name, _) = h.iter().next().unwrap();
        assert_eq!(name, "accept");
    }

    #[test]
    fn merge_prefers_other() {
        let mut defaults: HeaderMap = [("X-Client", "engine"), ("X-Trace", "1")].into_iter().collect();
        let call: HeaderMap = [("x-client", "caller")].into_iter().collect();
        defaults.merge(&call);
        assert_eq!(defaults.get("X-Client"), Some("caller"));
        assert_eq!(defaults.get("X-Trace"), Some("1"));
    }

    #[test]
    fn line_breaks_stripped() {
        let mut h = HeaderMap::new();
        h.insert("X-Evil\r\n", "a\r\nInjected: yes");
        assert_eq!(h.get("X-Evil"), Some("aInjected: yes"));
    }
}
