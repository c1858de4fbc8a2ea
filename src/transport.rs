//! Byte-counting transport over TCP + TLS
//!
//! The engine only needs four things from its transport: read some
//! bytes, queue command bytes, report how many bytes have been read
//! (throughput metering), and shut down gracefully. `Transport` wraps
//! any async stream with exactly that surface; `connect()` produces the
//! production instance over implicit TLS.

use crate::config::Config;
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

/// The production transport type: TLS over TCP.
pub type TlsTransport = Transport<tokio_rustls::client::TlsStream<TcpStream>>;

#[derive(Debug)]
pub struct Transport<S> {
    stream: S,
    bytes_read: Arc<AtomicU64>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Transport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            bytes_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Read whatever is available, counting the bytes. Returns `Ok(0)`
    /// at end of stream.
    pub async fn read_some(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.stream.read(buf).await?;
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    /// Queue command bytes and flush them out.
    pub async fn push_write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Shared view of the byte counter for the fetch timer.
    #[must_use]
    pub fn byte_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.bytes_read)
    }

    /// Graceful shutdown: send the TLS close_notify (or TCP FIN) and
    /// flush.
    pub async fn finish(&mut self) -> std::io::Result<()> {
        self.stream.shutdown().await
    }
}

/// Whether a read error is the expected shape of a clean connection
/// close: plain EOF, or the truncation rustls reports when the peer
/// skips its close_notify. Only meaningful once the session has logged
/// out; anywhere else the same error is fatal.
#[must_use]
pub fn is_benign_close(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset
    )
}

/// Open the TLS connection to `config.host:config.port`.
pub async fn connect(config: &Config) -> Result<TlsTransport> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!("Connecting to IMAP server at {}", addr);

    let tcp_stream = TcpStream::connect(&addr).await?;
    let connector = tls_connector(config.insecure_tls);
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

    let tls_stream = connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    info!("Connected to IMAP server");
    Ok(Transport::new(tls_stream))
}

fn tls_connector(insecure: bool) -> TlsConnector {
    let config = if insecure {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };
    TlsConnector::from(Arc::new(config))
}

/// Certificate verifier for `insecure_tls`: every chain and signature
/// is waved through, so the connection is encrypted but the peer is
/// unauthenticated. Only for servers with self-signed certificates.
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        // Advertise whatever the provider could verify; restricting the
        // list here would only narrow the handshake, not add safety.
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
