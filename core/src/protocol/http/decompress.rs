/*
 * decompress.rs
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

//! Gzip inflate for response bodies: in memory (buffered mode) and file to file (downloads).
//! Both expect gzip framing (header, deflate stream, CRC32 + ISIZE footer), not raw deflate.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::HttpError;

/// Read/inflate/write buffer size for file decompression.
const CHUNK_SIZE: usize = 4096;

/// Upper bound on the output preallocation taken from an untrusted footer.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// How the response body is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    /// Classify a Content-Encoding value. Absent, empty, or `identity` is no compression;
    /// anything other than gzip is returned as the error.
    pub fn from_content_encoding(value: Option<&str>) -> Result<Self, String> {
        match value.map(|v| v.trim()) {
            None | Some("") => Ok(Compression::None),
            Some(v) if v.eq_ignore_ascii_case("identity") => Ok(Compression::None),
            Some(v) if v.eq_ignore_ascii_case("gzip") => Ok(Compression::Gzip),
            Some(v) => Err(v.to_string()),
        }
    }
}

/// Uncompressed size (mod 2^32) from the 4-byte little-endian gzip footer.
pub fn gzip_isize(data: &[u8]) -> Option<u32> {
    if data.len() < 4 {
        return None;
    }
    let footer = &data[data.len() - 4..];
    Some(u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]))
}

/// Inflate a complete gzip member held in memory. An empty result is an error.
pub fn gunzip_bytes(data: &[u8]) -> Result<Vec<u8>, HttpError> {
    let expected = gzip_isize(data)
        .ok_or_else(|| HttpError::Decompression("gzip data too short".to_string()))?;
    let mut out = Vec::with_capacity((expected as usize).min(MAX_PREALLOC));
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| HttpError::Decompression(e.to_string()))?;
    if out.is_empty() {
        return Err(HttpError::Decompression(
            "failed to decompress response body".to_string(),
        ));
    }
    Ok(out)
}

/// Inflate `src` into `dst` in fixed-size chunks, then remove `src`. Returns bytes written.
///
/// On failure `src` is still removed and a partially written `dst` is deleted, so a failed
/// download leaves nothing behind.
pub fn gunzip_file(src: &Path, dst: &Path) -> Result<u64, HttpError> {
    let result = inflate_file(src, dst);
    if let Err(e) = fs::remove_file(src) {
        tracing::warn!("failed to remove {}: {}", src.display(), e);
    }
    if result.is_err() {
        let _ = fs::remove_file(dst);
    }
    result
}

fn inflate_file(src: &Path, dst: &Path) -> Result<u64, HttpError> {
    let input = File::open(src).map_err(|e| {
        HttpError::FileIo(format!("failed to open compressed file {}: {}", src.display(), e))
    })?;
    let output = File::create(dst).map_err(|e| {
        HttpError::FileIo(format!(
            "failed to open decompressed file for writing {}: {}",
            dst.display(),
            e
        ))
    })?;
    let mut decoder = GzDecoder::new(BufReader::with_capacity(CHUNK_SIZE, input));
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, output);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HttpError::Decompression(format!("inflate failed: {}", e))),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| HttpError::FileIo(format!("write to {} failed: {}", dst.display(), e)))?;
        total += n as u64;
    }
    writer
        .into_inner()
        .map_err(|e| HttpError::FileIo(format!("write to {} failed: {}", dst.display(), e.error())))?
        .sync_all()
        .map_err(|e| HttpError::FileIo(format!("sync of {} failed: {}", dst.display(), e)))?;
    Ok(total)
}

/// Transient file for the raw body of a download, beside the output file.
pub fn temp_path_for(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    output.with_file_name(format!(".{}.part", name))
}
