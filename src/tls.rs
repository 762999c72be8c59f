//! TLS termination using rustls.
//!
//! Certificates come from PEM files; handshakes are limited to the configured
//! host names. [`TlsListener`] plugs into `axum::serve`.

use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::{ClientHello, ResolvesServerCert};
use tokio_rustls::rustls::sign::CertifiedKey;
use tokio_rustls::rustls::{self, ServerConfig};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::error::Error;

/// Host names a certificate is served for. An empty policy accepts any host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostPolicy {
    domains: Vec<String>,
}

impl HostPolicy {
    pub fn new(domains: &[String]) -> Self {
        Self {
            domains: domains.iter().map(|d| d.trim().to_ascii_lowercase()).collect(),
        }
    }

    pub fn allows(&self, server_name: Option<&str>) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        server_name.is_some_and(|name| self.domains.iter().any(|d| d.eq_ignore_ascii_case(name)))
    }
}

#[derive(Debug)]
struct PolicyResolver {
    policy: HostPolicy,
    key: Arc<CertifiedKey>,
}

impl ResolvesServerCert for PolicyResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let name = client_hello.server_name();
        if self.policy.allows(name) {
            Some(self.key.clone())
        } else {
            tracing::warn!(server_name = ?name, "refusing TLS handshake for host outside policy");
            None
        }
    }
}

/// Build a rustls server config from PEM certificate chain and key files.
pub fn load_server_config(cert_path: &Path, key_path: &Path, domains: &[String]) -> Result<Arc<ServerConfig>, Error> {
    let certs = read_certs(cert_path)?;
    let key = read_key(key_path)?;
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
        .map_err(|e| Error::Tls(format!("unsupported private key: {}", e)))?;

    let resolver = PolicyResolver {
        policy: HostPolicy::new(domains),
        key: Arc::new(CertifiedKey::new(certs, signing_key)),
    };
    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(resolver));
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::Tls(format!("failed to open '{}': {}", path.display(), e)))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("failed to parse certificates: {}", e)))?;
    if certs.is_empty() {
        return Err(Error::Tls(format!("'{}' contains no certificates", path.display())));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| Error::Tls(format!("failed to parse private key: {}", e)))?
        .ok_or_else(|| Error::Tls(format!("'{}' contains no private key", path.display())))
}

/// Handshakes that have not finished by then are dropped.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Handshake = Option<(TlsStream<TcpStream>, SocketAddr)>;

/// TCP listener that hands connections to axum once their TLS handshake completes.
///
/// Handshakes run concurrently, so a client that connects and stalls does not hold up the rest.
pub struct TlsListener {
    tcp: TcpListener,
    acceptor: TlsAcceptor,
    handshakes: JoinSet<Handshake>,
    handshake_timeout: Duration,
}

impl TlsListener {
    pub fn new(tcp: TcpListener, server_config: Arc<ServerConfig>) -> Self {
        Self {
            tcp,
            acceptor: TlsAcceptor::from(server_config),
            handshakes: JoinSet::new(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

async fn handshake(acceptor: TlsAcceptor, stream: TcpStream, addr: SocketAddr, limit: Duration) -> Handshake {
    match tokio::time::timeout(limit, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => Some((tls_stream, addr)),
        Ok(Err(e)) => {
            tracing::warn!("TLS handshake failed from {}: {}", addr, e);
            None
        }
        Err(_) => {
            tracing::warn!("TLS handshake from {} timed out", addr);
            None
        }
    }
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    fn accept(&mut self) -> impl std::future::Future<Output = (Self::Io, Self::Addr)> + Send {
        async move {
            loop {
                tokio::select! {
                    accepted = self.tcp.accept() => match accepted {
                        Ok((stream, addr)) => {
                            let acceptor = self.acceptor.clone();
                            self.handshakes.spawn(handshake(acceptor, stream, addr, self.handshake_timeout));
                        }
                        Err(e) => {
                            tracing::error!("TCP accept error: {}", e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    },
                    Some(done) = self.handshakes.join_next(), if !self.handshakes.is_empty() => match done {
                        Ok(Some(connection)) => return connection,
                        Ok(None) => {}
                        Err(e) => tracing::error!("TLS handshake task failed: {}", e),
                    },
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}
