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

//! C FFI for divhttp core. Managers and responses are opaque handles.
//! Calls block the calling thread until the response is complete; do not call from a thread
//! that runs an async executor.
//! All string parameters are UTF-8 NUL-terminated. Pointers passed in must be valid for the
//! duration of the call; handles must come from this library and be freed exactly once.

use libc::{c_char, c_int, size_t};
use std::ffi::{CStr, CString};
use std::ptr;
use std::time::Duration;

use divhttp_core::{
    ConfigError, EngineConfig, HeaderMap, HttpCallResponse, Method, RequestManager,
};

pub const DIVHTTP_METHOD_GET: c_int = 0;
pub const DIVHTTP_METHOD_POST: c_int = 1;
pub const DIVHTTP_METHOD_PUT: c_int = 2;
pub const DIVHTTP_METHOD_DELETE: c_int = 3;

/// Opaque request manager handle.
pub struct DivhttpManager(RequestManager);

/// Opaque response handle. Strings handed out by accessors live as long as the handle.
pub struct DivhttpResponse {
    response: HttpCallResponse,
    output_path: Option<CString>,
    error: Option<CString>,
}

impl DivhttpResponse {
    fn new(response: HttpCallResponse) -> Self {
        let output_path = response
            .output_path()
            .and_then(|p| CString::new(p.to_string_lossy().into_owned()).ok());
        let error = response.error_message().map(to_cstring);
        Self {
            response,
            output_path,
            error,
        }
    }
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = const { std::cell::RefCell::new(None) };
}

/// Interior NULs would truncate the message; replace them.
fn to_cstring(s: String) -> CString {
    CString::new(s.replace('\0', " ")).unwrap_or_default()
}

fn set_last_error(msg: impl Into<String>) {
    let msg = to_cstring(msg.into());
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn set_config_error(err: &ConfigError) {
    set_last_error(err.to_string());
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

unsafe fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn method_from_code(code: c_int) -> Option<Method> {
    match code {
        DIVHTTP_METHOD_GET => Some(Method::Get),
        DIVHTTP_METHOD_POST => Some(Method::Post),
        DIVHTTP_METHOD_PUT => Some(Method::Put),
        DIVHTTP_METHOD_DELETE => Some(Method::Delete),
        _ => None,
    }
}

/// Seconds from C; zero or negative selects the manager's configured default.
fn timeout_or(secs: c_int, default: Duration) -> Duration {
    if secs > 0 {
        Duration::from_secs(secs as u64)
    } else {
        default
    }
}

/// Parallel name/value arrays into a header map. NULL entries are skipped.
unsafe fn headers_from_arrays(
    names: *const *const c_char,
    values: *const *const c_char,
    count: size_t,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if names.is_null() || values.is_null() {
        return headers;
    }
    for i in 0..count {
        if let (Some(name), Some(value)) = (ptr_to_str(*names.add(i)), ptr_to_str(*values.add(i))) {
            headers.insert(name, value);
        }
    }
    headers
}

fn config_with_threads(thread_count: c_int) -> EngineConfig {
    let config = EngineConfig::default();
    if thread_count > 0 {
        config.with_thread_count(thread_count as usize)
    } else {
        config
    }
}

fn into_response_handle(response: HttpCallResponse) -> *mut DivhttpResponse {
    match response.error_message() {
        Some(msg) => set_last_error(msg),
        None => clear_last_error(),
    }
    Box::into_raw(Box::new(DivhttpResponse::new(response)))
}

/// Library version. Static string; do not free.
#[no_mangle]
pub extern "C" fn divhttp_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until the next FFI call. Do not free.
#[no_mangle]
pub extern "C" fn divhttp_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by divhttp_response_header. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn divhttp_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Manager for the scheme, host and port of `base_url` (e.g. "https://api.example.com").
/// `thread_count` <= 0 uses the default. Returns NULL on error (see divhttp_last_error).
#[no_mangle]
pub unsafe extern "C" fn divhttp_manager_new_from_url(
    base_url: *const c_char,
    thread_count: c_int,
) -> *mut DivhttpManager {
    let url = match ptr_to_str(base_url) {
        Some(u) => u,
        None => {
            set_last_error("base_url is NULL or not UTF-8");
            return ptr::null_mut();
        }
    };
    match RequestManager::from_url(&url, config_with_threads(thread_count)) {
        Ok(m) => {
            clear_last_error();
            Box::into_raw(Box::new(DivhttpManager(m)))
        }
        Err(e) => {
            set_config_error(&e);
            ptr::null_mut()
        }
    }
}

/// Manager for an explicit host and port. `use_tls` non-zero enables HTTPS.
#[no_mangle]
pub unsafe extern "C" fn divhttp_manager_new(
    host: *const c_char,
    port: c_int,
    use_tls: c_int,
    thread_count: c_int,
) -> *mut DivhttpManager {
    let host = match ptr_to_str(host) {
        Some(h) => h,
        None => {
            set_last_error("host is NULL or not UTF-8");
            return ptr::null_mut();
        }
    };
    let port = match u16::try_from(port) {
        Ok(p) if p != 0 => p,
        _ => {
            set_last_error(format!("invalid port {}", port));
            return ptr::null_mut();
        }
    };
    match RequestManager::new(host, port, use_tls != 0, config_with_threads(thread_count)) {
        Ok(m) => {
            clear_last_error();
            Box::into_raw(Box::new(DivhttpManager(m)))
        }
        Err(e) => {
            set_config_error(&e);
            ptr::null_mut()
        }
    }
}

/// Stop the manager's workers and free it. No-op if NULL.
#[no_mangle]
pub unsafe extern "C" fn divhttp_manager_free(manager: *mut DivhttpManager) {
    if !manager.is_null() {
        drop(Box::from_raw(manager));
    }
}

/// Add or replace one default header. Must not race with requests on the same manager.
/// Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn divhttp_manager_set_default_header(
    manager: *mut DivhttpManager,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    let Some(manager) = manager.as_mut() else {
        set_last_error("manager is NULL");
        return -1;
    };
    let (Some(name), Some(value)) = (ptr_to_str(name), ptr_to_str(value)) else {
        set_last_error("header name or value is NULL or not UTF-8");
        return -1;
    };
    let mut headers = manager.0.default_headers().clone();
    headers.insert(name, value);
    manager.0.set_default_headers(headers);
    clear_last_error();
    0
}

/// Send a request and buffer the response. `method` is one of DIVHTTP_METHOD_*. `body` may be
/// NULL when `body_len` is 0. Timeouts are in seconds; 0 uses the configured default.
/// Returns a response handle (free with divhttp_response_free), or NULL on bad arguments.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn divhttp_send_request(
    manager: *const DivhttpManager,
    url: *const c_char,
    method: c_int,
    token: *const c_char,
    content_type: *const c_char,
    body: *const u8,
    body_len: size_t,
    header_names: *const *const c_char,
    header_values: *const *const c_char,
    header_count: size_t,
    connect_timeout_secs: c_int,
    request_timeout_secs: c_int,
) -> *mut DivhttpResponse {
    let Some(manager) = manager.as_ref() else {
        set_last_error("manager is NULL");
        return ptr::null_mut();
    };
    let Some(url) = ptr_to_str(url) else {
        set_last_error("url is NULL or not UTF-8");
        return ptr::null_mut();
    };
    let Some(method) = method_from_code(method) else {
        set_last_error(format!("unknown method code {}", method));
        return ptr::null_mut();
    };
    let token = ptr_to_str(token).unwrap_or_default();
    let content_type = ptr_to_str(content_type).unwrap_or_default();
    let body: &[u8] = if body.is_null() || body_len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(body, body_len)
    };
    let headers = headers_from_arrays(header_names, header_values, header_count);
    let (connect_default, request_default) = manager.0.default_timeouts();
    let response = manager.0.send_request(
        &url,
        method,
        &token,
        &content_type,
        body,
        &headers,
        timeout_or(connect_timeout_secs, connect_default),
        timeout_or(request_timeout_secs, request_default),
    );
    into_response_handle(response)
}

/// Download `url` to `output_path`, decoding gzip. Same conventions as divhttp_send_request.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn divhttp_download_file(
    manager: *const DivhttpManager,
    output_path: *const c_char,
    url: *const c_char,
    token: *const c_char,
    header_names: *const *const c_char,
    header_values: *const *const c_char,
    header_count: size_t,
    connect_timeout_secs: c_int,
    request_timeout_secs: c_int,
) -> *mut DivhttpResponse {
    let Some(manager) = manager.as_ref() else {
        set_last_error("manager is NULL");
        return ptr::null_mut();
    };
    let (Some(output_path), Some(url)) = (ptr_to_str(output_path), ptr_to_str(url)) else {
        set_last_error("output_path or url is NULL or not UTF-8");
        return ptr::null_mut();
    };
    let token = ptr_to_str(token).unwrap_or_default();
    let headers = headers_from_arrays(header_names, header_values, header_count);
    let (connect_default, request_default) = manager.0.default_timeouts();
    let response = manager.0.download_file_from_url(
        &output_path,
        &url,
        &token,
        &headers,
        timeout_or(connect_timeout_secs, connect_default),
        timeout_or(request_timeout_secs, request_default),
    );
    into_response_handle(response)
}

/// HTTP status, or 500 for a failed call. -1 if `response` is NULL.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_status(response: *const DivhttpResponse) -> c_int {
    match response.as_ref() {
        Some(r) => r.response.status as c_int,
        None => -1,
    }
}

/// 1 if the exchange completed (whatever the status), 0 otherwise.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_is_success(response: *const DivhttpResponse) -> c_int {
    match response.as_ref() {
        Some(r) if r.response.is_success() => 1,
        _ => 0,
    }
}

/// Buffered body bytes; length written to `out_len`. NULL for downloads and failures.
/// Valid until divhttp_response_free.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_content(
    response: *const DivhttpResponse,
    out_len: *mut size_t,
) -> *const u8 {
    let content = response.as_ref().and_then(|r| r.response.content());
    if !out_len.is_null() {
        *out_len = content.map(|c| c.len()).unwrap_or(0);
    }
    content.map(|c| c.as_ptr()).unwrap_or(ptr::null())
}

/// Output file of a successful download, or NULL. Valid until divhttp_response_free.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_output_path(
    response: *const DivhttpResponse,
) -> *const c_char {
    response
        .as_ref()
        .and_then(|r| r.output_path.as_ref())
        .map(|s| s.as_ptr())
        .unwrap_or(ptr::null())
}

/// Error message of a failed call, or NULL. Valid until divhttp_response_free.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_error(response: *const DivhttpResponse) -> *const c_char {
    response
        .as_ref()
        .and_then(|r| r.error.as_ref())
        .map(|s| s.as_ptr())
        .unwrap_or(ptr::null())
}

/// Response header value (case-insensitive name), or NULL. Free with divhttp_free_string.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_header(
    response: *const DivhttpResponse,
    name: *const c_char,
) -> *mut c_char {
    let (Some(r), Some(name)) = (response.as_ref(), ptr_to_str(name)) else {
        return ptr::null_mut();
    };
    r.response
        .headers
        .get(&name)
        .map(|v| to_cstring(v.to_string()).into_raw())
        .unwrap_or(ptr::null_mut())
}

/// Free a response handle. No-op if NULL.
#[no_mangle]
pub unsafe extern "C" fn divhttp_response_free(response: *mut DivhttpResponse) {
    if !response.is_null() {
        drop(Box::from_raw(response));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn last_error() -> String {
        let p = divhttp_last_error();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p).to_str().unwrap().to_string() }
    }

    /// Answer one connection with a fixed response.
    fn one_shot_server(response: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut seen = Vec::new();
                let mut buf = [0u8; 1024];
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => seen.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(response);
            }
        });
        port
    }

    #[test]
    fn version_is_package_version() {
        let v = unsafe { CStr::from_ptr(divhttp_version()) };
        assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn bad_construction_sets_last_error() {
        let url = cstr("not a url");
        let m = unsafe { divhttp_manager_new_from_url(url.as_ptr(), 1) };
        assert!(m.is_null());
        assert!(!last_error().is_empty());

        let host = cstr("localhost");
        let m = unsafe { divhttp_manager_new(host.as_ptr(), 70000, 0, 1) };
        assert!(m.is_null());
        assert!(last_error().contains("invalid port"));
    }

    #[test]
    fn send_request_round_trip() {
        let port = one_shot_server(b"HTTP/1.1 200 OK\r\nX-Id: 7\r\nContent-Length: 11\r\n\r\n{\"ok\":true}");
        let host = cstr("127.0.0.1");
        let url = cstr("/health");
        let ct = cstr("application/json");
        let name = cstr("Accept");
        let value = cstr("application/json");
        let names = [name.as_ptr()];
        let values = [value.as_ptr()];
        unsafe {
            let m = divhttp_manager_new(host.as_ptr(), port as c_int, 0, 1);
            assert!(!m.is_null());
            assert_eq!(divhttp_manager_set_default_header(m, name.as_ptr(), value.as_ptr()), 0);
            let r = divhttp_send_request(
                m,
                url.as_ptr(),
                DIVHTTP_METHOD_GET,
                ptr::null(),
                ct.as_ptr(),
                ptr::null(),
                0,
                names.as_ptr(),
                values.as_ptr(),
                1,
                5,
                5,
            );
            assert!(!r.is_null());
            assert_eq!(divhttp_response_status(r), 200);
            assert_eq!(divhttp_response_is_success(r), 1);
            let mut len: size_t = 0;
            let body = divhttp_response_content(r, &mut len);
            assert_eq!(std::slice::from_raw_parts(body, len), b"{\"ok\":true}");
            assert!(divhttp_response_error(r).is_null());
            assert!(divhttp_response_output_path(r).is_null());
            let header_name = cstr("x-id");
            let h = divhttp_response_header(r, header_name.as_ptr());
            assert_eq!(CStr::from_ptr(h).to_str().unwrap(), "7");
            divhttp_free_string(h);
            divhttp_response_free(r);
            divhttp_manager_free(m);
        }
    }

    #[test]
    fn failed_call_reports_error() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let host = cstr("127.0.0.1");
        let url = cstr("/");
        unsafe {
            let m = divhttp_manager_new(host.as_ptr(), port as c_int, 0, 0);
            let r = divhttp_send_request(
                m,
                url.as_ptr(),
                DIVHTTP_METHOD_DELETE,
                ptr::null(),
                ptr::null(),
                ptr::null(),
                0,
                ptr::null(),
                ptr::null(),
                0,
                2,
                2,
            );
            assert_eq!(divhttp_response_status(r), 500);
            assert_eq!(divhttp_response_is_success(r), 0);
            assert!(!divhttp_response_error(r).is_null());
            assert!(!last_error().is_empty());
            let bad = divhttp_send_request(
                m,
                url.as_ptr(),
                42,
                ptr::null(),
                ptr::null(),
                ptr::null(),
                0,
                ptr::null(),
                ptr::null(),
                0,
                0,
                0,
            );
            assert!(bad.is_null());
            divhttp_response_free(r);
            divhttp_manager_free(m);
        }
        unsafe {
            divhttp_response_free(ptr::null_mut());
            divhttp_manager_free(ptr::null_mut());
        }
        assert_eq!(unsafe { divhttp_response_status(ptr::null()) }, -1);
    }
}
