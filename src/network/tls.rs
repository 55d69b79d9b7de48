//! TLS upgrade for outgoing connections.
//!
//! Certificate policy is out of scope here: roots come from the configured
//! PEM bundle and rustls performs its standard verification.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::{AppError, AppResult, TlsConfig};

pub type ClientTlsStream = tokio_rustls::client::TlsStream<TcpStream>;

fn load_certs(path: &Path) -> AppResult<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| {
        AppError::TlsError(format!(
            "failed to open ca file {}: {}",
            path.display(),
            e
        ))
    })?;
    let mut reader = BufReader::new(file);

    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .filter_map(|r| r.ok())
        .collect();

    if certs.is_empty() {
        return Err(AppError::TlsError(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

pub fn client_config(tls: &TlsConfig) -> AppResult<Arc<ClientConfig>> {
    let ca_file = tls
        .ca_file
        .as_deref()
        .ok_or_else(|| AppError::TlsError("tls enabled but no ca_file configured".to_string()))?;

    let mut roots = RootCertStore::empty();
    for cert in load_certs(Path::new(ca_file))? {
        roots
            .add(cert)
            .map_err(|e| AppError::TlsError(format!("invalid certificate in {}: {}", ca_file, e)))?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Runs the client handshake over an established TCP stream.
pub async fn connect_tls(
    stream: TcpStream,
    address: &str,
    tls: &TlsConfig,
) -> AppResult<ClientTlsStream> {
    let connector = TlsConnector::from(client_config(tls)?);
    let server_name = ServerName::try_from(address.to_string())
        .map_err(|e| AppError::TlsError(format!("invalid server name {}: {}", address, e)))?;
    debug!(target: "matrixlink::network", "starting tls handshake with {}", address);
    let tls_stream = connector.connect(server_name, stream).await?;
    Ok(tls_stream)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_ca_file_setting() {
        let tls = TlsConfig {
            enabled: true,
            check_hostname: true,
            ca_file: None,
        };
        assert!(matches!(client_config(&tls), Err(AppError::TlsError(_))));
    }

    #[test]
    fn test_unreadable_ca_file() {
        let tls = TlsConfig {
            enabled: true,
            check_hostname: true,
            ca_file: Some("/nonexistent/ca.pem".to_string()),
        };
        assert!(matches!(client_config(&tls), Err(AppError::TlsError(_))));
    }

    #[test]
    fn test_ca_file_without_certificates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a pem bundle\n").unwrap();
        let tls = TlsConfig {
            enabled: true,
            check_hostname: false,
            ca_file: Some(file.path().to_string_lossy().into_owned()),
        };
        let err = client_config(&tls).unwrap_err();
        assert!(err.to_string().contains("no certificates found"));
    }
}
