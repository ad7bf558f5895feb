/*
 * net.rs
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

//! TLS trust context for HTTPS managers.
//!
//! Roots are the platform native certs, falling back to the bundled Mozilla roots, plus an
//! optional PEM bundle from the configuration. Peers are always verified, only TLS 1.2 and 1.3
//! are offered, and ALPN advertises http/1.1 only. The default connector is built once per
//! process; a manager with its own CA bundle builds its own.

use std::io;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::version::{TLS12, TLS13};
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

use crate::error::ConfigError;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store(ca_file: Option<&Path>) -> Result<RootCertStore, ConfigError> {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            tracing::debug!(added, ignored, "loaded native root certificates");
        }
        Err(e) => tracing::warn!("could not load native root certificates: {}", e),
    }
    if root_store.is_empty() {
        root_store
            .roots
            .extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    if let Some(path) = ca_file {
        add_pem_bundle(&mut root_store, path)?;
    }
    Ok(root_store)
}

fn add_pem_bundle(root_store: &mut RootCertStore, path: &Path) -> Result<(), ConfigError> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| ConfigError::Tls(format!("cannot read {}: {}", path.display(), e)))?;
    let mut count = 0usize;
    for cert in certs {
        let cert =
            cert.map_err(|e| ConfigError::Tls(format!("bad PEM in {}: {}", path.display(), e)))?;
        root_store
            .add(cert)
            .map_err(|e| ConfigError::Tls(format!("bad certificate in {}: {}", path.display(), e)))?;
        count += 1;
    }
    if count == 0 {
        return Err(ConfigError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(())
}

/// Client config for the HTTP engine: verified peers, TLS 1.2+, ALPN http/1.1.
pub fn http_client_config(ca_file: Option<&Path>) -> Result<Arc<ClientConfig>, ConfigError> {
    let roots = build_root_store(ca_file)?;
    let mut config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_protocol_versions(&[&TLS13, &TLS12])
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

fn default_connector() -> Result<TlsConnector, ConfigError> {
    if let Some(c) = DEFAULT_CONNECTOR.get() {
        return Ok(c.clone());
    }
    let connector = TlsConnector::from(http_client_config(None)?);
    Ok(DEFAULT_CONNECTOR.get_or_init(|| connector).clone())
}

/// Connector for a manager: the shared default, or a dedicated one when a CA bundle is set.
pub fn tls_connector(ca_file: Option<&Path>) -> Result<TlsConnector, ConfigError> {
    match ca_file {
        None => default_connector(),
        Some(path) => Ok(TlsConnector::from(http_client_config(Some(path))?)),
    }
}

/// SNI name for a host. Bracketed IPv6 literals are accepted.
pub fn server_name(host: &str) -> io::Result<ServerName<'static>> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    ServerName::try_from(bare.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))
}
