//! Certificate expiry inspection.
//!
//! The HTTP client never exposes the peer certificate, so the SSL check runs
//! its own TLS handshake against the monitored host and reads the leaf
//! certificate's validity window.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use url::Url;
use x509_parser::prelude::*;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SslExpiry {
    pub expiry_date: String,
    pub days_until_expiry: i64,
    /// Issuer RDN attributes flattened to name -> value.
    pub issuer: HashMap<String, String>,
}

/// Handshake with the URL's host (port from the URL, default 443) and report
/// the peer certificate's expiry.
pub async fn ssl_expiry(raw_url: &str) -> Result<SslExpiry> {
    let parsed = Url::parse(raw_url).context("Invalid URL")?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("URL has no host"))?
        .to_string();
    let port = parsed.port().unwrap_or(443);

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name =
        ServerName::try_from(host.clone()).map_err(|_| anyhow!("Invalid server name: {}", host))?;

    let tcp = timeout(HANDSHAKE_TIMEOUT, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| anyhow!("TLS connection to {}:{} timed out", host, port))?
        .with_context(|| format!("TCP connection to {}:{} failed", host, port))?;

    let tls = timeout(HANDSHAKE_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| anyhow!("TLS handshake with {}:{} timed out", host, port))?
        .with_context(|| format!("TLS handshake with {}:{} failed", host, port))?;

    let (_, session) = tls.get_ref();
    let cert = session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| anyhow!("Server presented no certificate"))?;

    let (_, parsed_cert) = parse_x509_certificate(cert.as_ref())
        .map_err(|e| anyhow!("Failed to parse peer certificate: {}", e))?;

    let not_after = parsed_cert.validity().not_after.timestamp();
    let expiry = DateTime::<Utc>::from_timestamp(not_after, 0)
        .ok_or_else(|| anyhow!("Certificate notAfter out of range"))?;
    let days_until_expiry = (expiry - Utc::now()).num_days();

    let issuer_name = parsed_cert.issuer();
    let mut issuer = HashMap::new();
    if let Some(cn) = issuer_name
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
    {
        issuer.insert("commonName".to_string(), cn.to_string());
    }
    if let Some(org) = issuer_name
        .iter_organization()
        .next()
        .and_then(|attr| attr.as_str().ok())
    {
        issuer.insert("organizationName".to_string(), org.to_string());
    }
    if let Some(country) = issuer_name
        .iter_country()
        .next()
        .and_then(|attr| attr.as_str().ok())
    {
        issuer.insert("countryName".to_string(), country.to_string());
    }

    Ok(SslExpiry {
        expiry_date: expiry.to_rfc3339(),
        days_until_expiry,
        issuer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_against_dead_port_fails() {
        // Bind a listener to reserve a port, then drop it so nothing answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = ssl_expiry(&format!("https://127.0.0.1:{}/", port)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_url_without_host() {
        assert!(ssl_expiry("mailto:ops@example.com").await.is_err());
    }
}
