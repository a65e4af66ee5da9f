//! Opening the upstream connection (plain TCP or TLS).

use crate::config::ServerConfig;
use crate::error::EngineError;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{debug, info, warn};

/// Any duplex byte stream the engine can run over.
pub trait IrcStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> IrcStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedStream = Box<dyn IrcStream>;

/// Connect to the configured server, upgrading to TLS when asked.
pub async fn connect(server: &ServerConfig) -> Result<BoxedStream, EngineError> {
    let address = format!("{}:{}", server.address, server.port);
    let tcp = TcpStream::connect(&address)
        .await
        .map_err(|source| EngineError::Connect {
            address: address.clone(),
            source,
        })?;
    tcp.set_nodelay(true)?;
    info!(address = %address, tls = server.tls, "Connected to server");

    if !server.tls {
        return Ok(Box::new(tcp));
    }

    let stream = upgrade_to_tls(tcp, &server.address).await?;
    Ok(Box::new(stream))
}

/// TLS handshake against the system root store.
pub async fn upgrade_to_tls(
    tcp: TcpStream,
    hostname: &str,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, EngineError> {
    let connector = TlsConnector::from(Arc::new(client_config()?));
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| EngineError::InvalidServerName(hostname.to_string()))?;

    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| EngineError::Tls(e.to_string()))?;
    info!(hostname = %hostname, "TLS handshake completed");
    Ok(stream)
}

fn client_config() -> Result<ClientConfig, EngineError> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!(error = %e, "Error loading native certs");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "Loaded native root certificates");

    if roots.is_empty() {
        return Err(EngineError::Tls("no usable root certificates".to_string()));
    }

    Ok(ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}
