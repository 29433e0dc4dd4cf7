//! Opening the chat socket.
//!
//! The client never opens sockets itself: it asks a [`Connector`] for a fresh
//! byte stream on every connect attempt. [`TcpConnector`] is the default and
//! speaks plain TCP or TLS; tests and embedders can supply any other
//! connector, including a plain closure.

mod codec;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig as TlsConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

pub use self::codec::{LineCodec, MAX_LINE_LEN};

/// A bidirectional byte stream the client can run a session over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Type-erased stream returned by connectors.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens one stream per connect attempt.
///
/// Any `Fn() -> impl Future<Output = anyhow::Result<BoxedStream>>` closure is
/// a connector.
pub trait Connector: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>>;
}

impl<F, Fut> Connector for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<BoxedStream>> + Send + 'static,
{
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>> {
        Box::pin(self())
    }
}

/// Connects over TCP, optionally wrapped in TLS verified against the
/// webpki root store.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    host: String,
    port: u16,
    tls: bool,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    async fn open(&self) -> Result<BoxedStream> {
        let addr = format!("{}:{}", self.host, self.port);
        let tcp = TcpStream::connect(addr.as_str())
            .await
            .with_context(|| format!("TCP connect to {addr} failed"))?;
        if let Err(e) = enable_keepalive(&tcp) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        debug!(%addr, tls = self.tls, "socket opened");

        if !self.tls {
            return Ok(Box::new(tcp));
        }

        let connector = TlsConnector::from(Arc::new(tls_config()));
        let server_name = ServerName::try_from(self.host.clone())
            .with_context(|| format!("invalid TLS server name {:?}", self.host))?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .with_context(|| format!("TLS handshake with {addr} failed"))?;
        Ok(Box::new(stream))
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>> {
        Box::pin(self.open())
    }
}

fn enable_keepalive(stream: &TcpStream) -> Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)?;
    Ok(())
}

fn tls_config() -> TlsConfig {
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    TlsConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}
