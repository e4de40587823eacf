//! TLS verification policy. The original source disabled certificate
//! verification unconditionally; this is re-architected as an explicit
//! choice the caller must make — no silently permissive default.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::{KineticError, Result};

/// How a session validates the drive's TLS certificate.
#[derive(Clone)]
pub enum TlsMode {
    /// Plaintext, no TLS at all.
    Disabled,
    /// TLS, but certificate verification is skipped. Matches the
    /// original source's default; kept available, never the default
    /// here.
    Insecure,
    /// TLS, verified against the platform's trust anchors
    /// (`webpki-roots`).
    VerifyAgainstSystemRoots,
    /// TLS, verified against a caller-supplied PEM certificate bundle.
    VerifyAgainstBundle(Vec<u8>),
}

/// Either a plain TCP stream or a TLS stream wrapping one, behind a
/// single `Read + Write` object so the rest of the session doesn't care
/// which.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::Tls(s) => s.flush(),
        }
    }
}

impl Transport {
    /// Applies the same read/write timeout to the underlying socket
    /// regardless of which variant this is.
    pub fn set_timeouts(&self, timeout: std::time::Duration) -> std::io::Result<()> {
        let sock = match self {
            Transport::Plain(s) => s,
            Transport::Tls(s) => &s.sock,
        };
        sock.set_read_timeout(Some(timeout))?;
        sock.set_write_timeout(Some(timeout))
    }

    /// Shuts down the socket in both directions. Safe to call more than
    /// once; a second call just observes the socket is already gone.
    pub fn shutdown(&self) -> std::io::Result<()> {
        let sock = match self {
            Transport::Plain(s) => s,
            Transport::Tls(s) => &s.sock,
        };
        sock.shutdown(std::net::Shutdown::Both)
    }
}

static CRYPTO_PROVIDER_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_crypto_provider_installed() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::aws_lc_rs::default_provider(),
        );
    });
}

pub fn connect(host: &str, port: u16, mode: &TlsMode) -> Result<Transport> {
    let tcp = TcpStream::connect((host, port))?;

    match mode {
        TlsMode::Disabled => Ok(Transport::Plain(tcp)),
        TlsMode::Insecure | TlsMode::VerifyAgainstSystemRoots | TlsMode::VerifyAgainstBundle(_) => {
            ensure_crypto_provider_installed();
            let config = build_client_config(mode)?;
            let server_name = ServerName::try_from(host.to_string())
                .map_err(|e| KineticError::Tls(format!("invalid server name {host:?}: {e}")))?;
            let conn = ClientConnection::new(Arc::new(config), server_name)
                .map_err(|e| KineticError::Tls(e.to_string()))?;
            Ok(Transport::Tls(Box::new(StreamOwned::new(conn, tcp))))
        }
    }
}

fn build_client_config(mode: &TlsMode) -> Result<ClientConfig> {
    let builder = ClientConfig::builder();

    let config = match mode {
        TlsMode::Insecure => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth(),
        TlsMode::VerifyAgainstSystemRoots => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsMode::VerifyAgainstBundle(pem) => {
            let mut roots = RootCertStore::empty();
            let mut cursor = std::io::Cursor::new(pem);
            for cert in rustls_pemfile::certs(&mut cursor) {
                let cert = cert.map_err(|e| KineticError::Tls(e.to_string()))?;
                roots
                    .add(cert)
                    .map_err(|e| KineticError::Tls(e.to_string()))?;
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsMode::Disabled => unreachable!("Disabled is handled by the caller"),
    };

    Ok(config)
}

/// Backs [`TlsMode::Insecure`]. Accepts any certificate chain
/// unconditionally; never used unless the caller opted in explicitly.
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
