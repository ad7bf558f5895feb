/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Fixture servers for the integration tests: a loopback HTTP/1.1 server with canned responses,
 * the same over TLS with a throwaway certificate, and a server that never answers.
 * Each runs on its own std thread and records the requests it sees.
 */

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use flate2::write::GzEncoder;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};

/// One request as the fixture received it.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> Vec<u8> + Send + Sync>;

pub struct FixtureServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FixtureServer {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }

    /// Plain HTTP fixture; `respond` builds the raw response bytes for each request.
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(&Recorded) -> Vec<u8> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let respond: Responder = Arc::new(respond);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let seen = seen.clone();
                let respond = respond.clone();
                thread::spawn(move || {
                    let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
                    if let Some(request) = read_request(&mut stream) {
                        let response = respond(&request);
                        seen.lock().unwrap().push(request);
                        let _ = stream.write_all(&response);
                        let _ = stream.flush();
                    }
                });
            }
        });
        Self { addr, requests }
    }

    /// Always answer with the same bytes.
    pub fn canned(response: Vec<u8>) -> Self {
        Self::start(move |_| response.clone())
    }

    /// Accepts connections and reads requests but never answers.
    pub fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let mut held: Vec<TcpStream> = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        Self {
            addr,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Certificate for `localhost`, written as PEM so it can be configured as a trusted CA.
pub struct TestCert {
    pub cert: CertificateDer<'static>,
    pub key: Vec<u8>,
    pub pem_path: PathBuf,
}

impl TestCert {
    pub fn generate(dir: &Path) -> Self {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let pem_path = dir.join("localhost.pem");
        std::fs::write(&pem_path, certified.cert.pem()).unwrap();
        Self {
            cert: certified.cert.der().clone(),
            key: certified.key_pair.serialize_der(),
            pem_path,
        }
    }
}

pub struct TlsFixtureServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TlsFixtureServer {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Answer every request with `response`, then close with close_notify.
    pub fn canned(cert: &TestCert, response: Vec<u8>) -> Self {
        Self::start(cert, response, true)
    }

    /// Answer with `response`, then drop the TCP connection without close_notify.
    pub fn abrupt(cert: &TestCert, response: Vec<u8>) -> Self {
        Self::start(cert, response, false)
    }

    fn start(cert: &TestCert, response: Vec<u8>, close_notify: bool) -> Self {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key.clone()));
        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.clone()], key)
        .unwrap();
        let config = Arc::new(config);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        thread::spawn(move || {
            for tcp in listener.incoming().flatten() {
                let config = config.clone();
                let seen = seen.clone();
                let response = response.clone();
                thread::spawn(move || {
                    let _ = tcp.set_read_timeout(Some(Duration::from_secs(10)));
                    let Ok(conn) = ServerConnection::new(config) else { return };
                    let mut tls = StreamOwned::new(conn, tcp);
                    // Fails here when the client rejects the certificate.
                    if let Some(request) = read_request(&mut tls) {
                        seen.lock().unwrap().push(request);
                        let _ = tls.write_all(&response);
                        if close_notify {
                            tls.conn.send_close_notify();
                        }
                        let _ = tls.flush();
                        let _ = tls.sock.shutdown(std::net::Shutdown::Write);
                    }
                });
            }
        });
        Self { addr, requests }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read one request: head up to the blank line, then Content-Length bytes of body.
fn read_request<S: Read>(stream: &mut S) -> Option<Recorded> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };
    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let mut recorded = Recorded {
        request_line,
        headers,
        body: data[head_end + 4..].to_vec(),
    };
    let length = recorded
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while recorded.body.len() < length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        recorded.body.extend_from_slice(&buf[..n]);
    }
    Some(recorded)
}

/// `HTTP/1.1 <status>` response with the given extra headers and a Content-Length body.
pub fn response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Response framed only by the connection closing: no Content-Length, no chunking.
pub fn close_delimited(status: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {}\r\nConnection: close\r\n\r\n", status).into_bytes();
    out.extend_from_slice(body);
    out
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}
