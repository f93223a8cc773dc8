//! Server TLS identity loading. Grounded on `original_source/tls/load.go`'s
//! `LoadCredentials`, adapted from `crypto/tls.LoadX509KeyPair` +
//! `grpc/credentials` to this crate's `rustls` stack.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsLoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid server config: {0}")]
    Config(#[from] rustls::Error),
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsLoadError> {
    let file = File::open(path).map_err(|source| TlsLoadError::Io { path: path.display().to_string(), source })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsLoadError::Io { path: path.display().to_string(), source })
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsLoadError> {
    let file = File::open(path).map_err(|source| TlsLoadError::Io { path: path.display().to_string(), source })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsLoadError::Io { path: path.display().to_string(), source })?
        .ok_or_else(|| TlsLoadError::NoPrivateKey(path.display().to_string()))
}

/// Builds a server-side [`ServerConfig`] from a certificate chain and private
/// key, optionally requiring client certificates signed by `ca_path`.
///
/// Mirrors `LoadCredentials`'s shape (cert + key in, ready-to-use transport
/// credentials out) but without `ca_path` the original always left client
/// auth disabled; this crate additionally supports turning it on when a CA
/// bundle is supplied, since the pack's TLS-serving examples do.
pub fn load_server_config(cert_path: &Path, key_path: &Path, ca_path: Option<&Path>) -> Result<ServerConfig, TlsLoadError> {
    let certs = read_certs(cert_path)?;
    if certs.is_empty() {
        return Err(TlsLoadError::NoCertificates(cert_path.display().to_string()));
    }
    let key = read_private_key(key_path)?;

    let builder = ServerConfig::builder();
    let config = if let Some(ca_path) = ca_path {
        let ca_certs = read_certs(ca_path)?;
        let mut roots = rustls::RootCertStore::empty();
        for cert in ca_certs {
            roots.add(cert).map_err(TlsLoadError::Config)?;
        }
        let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|err| TlsLoadError::Config(rustls::Error::General(err.to_string())))?;
        builder.with_client_cert_verifier(verifier).with_single_cert(certs, key)?
    } else {
        builder.with_no_client_auth().with_single_cert(certs, key)?
    };

    Ok(config)
}
