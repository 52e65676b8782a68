use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dns_message::{frame, FRAME_PREFIX_LEN};
use crate::error::DnsError;
use crate::forwarder::UDP_MAX_LEN;
use crate::resolver::Resolver;

/// Front end accepting client queries over UDP and TCP on one address
pub struct DnsServer {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    resolver: Arc<Resolver>,
    /// Use TCP upstream for UDP clients as well
    always_tcp: bool,
    shutdown_rx: broadcast::Receiver<()>,
}

impl DnsServer {
    /// Bind both sockets. Port 0 picks a free port shared by UDP and TCP.
    pub async fn bind(
        addr: SocketAddr,
        resolver: Arc<Resolver>,
        always_tcp: bool,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> io::Result<Self> {
        let tcp = TcpListener::bind(addr).await?;
        let udp = UdpSocket::bind(tcp.local_addr()?).await?;

        Ok(Self {
            udp: Arc::new(udp),
            tcp,
            resolver,
            always_tcp,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Serve until the shutdown signal fires
    pub async fn run(mut self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "DNS server listening");

        let mut buf = vec![0u8; UDP_MAX_LEN];

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("DNS server shutting down");
                    break;
                }

                result = self.udp.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src)) => {
                            let query = buf[..len].to_vec();
                            let socket = self.udp.clone();
                            let resolver = self.resolver.clone();
                            let prefer_tcp = self.always_tcp;

                            tokio::spawn(async move {
                                handle_udp_query(&socket, &resolver, &query, src, prefer_tcp).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "UDP receive failed");
                        }
                    }
                }

                result = self.tcp.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let resolver = self.resolver.clone();
                            tokio::spawn(async move {
                                if let Err(e) = serve_tcp_client(stream, peer, &resolver).await {
                                    debug!(client = %peer, error = %e, "TCP client dropped");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "TCP accept failed");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Resolve a framed query, keeping replies the resolver could not decode
async fn resolve(resolver: &Resolver, query: &[u8], client: &str, prefer_tcp: bool) -> Option<Bytes> {
    match resolver.exchange(query, client, prefer_tcp).await {
        Ok(reply) => Some(reply),
        Err(DnsError::UndecodedReply { reply, .. }) => Some(reply),
        Err(e) => {
            warn!(client, error = %e, "query failed");
            None
        }
    }
}

async fn handle_udp_query(
    socket: &UdpSocket,
    resolver: &Resolver,
    query: &[u8],
    src: SocketAddr,
    prefer_tcp: bool,
) {
    let framed = match frame(query) {
        Ok(framed) => framed,
        Err(e) => {
            debug!(client = %src, error = %e, "dropping oversized datagram");
            return;
        }
    };

    let client = src.to_string();
    let Some(reply) = resolve(resolver, &framed, &client, prefer_tcp).await else {
        return;
    };

    if let Err(e) = socket.send_to(&reply[FRAME_PREFIX_LEN..], src).await {
        warn!(client = %src, error = %e, "failed to send DNS response");
    }
}

/// Answer length-prefixed queries on one connection until the client hangs up
async fn serve_tcp_client(mut stream: TcpStream, peer: SocketAddr, resolver: &Resolver) -> io::Result<()> {
    let client = peer.to_string();

    loop {
        let len = match stream.read_u16().await {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut query = vec![0u8; FRAME_PREFIX_LEN + len as usize];
        query[..FRAME_PREFIX_LEN].copy_from_slice(&len.to_be_bytes());
        stream.read_exact(&mut query[FRAME_PREFIX_LEN..]).await?;

        if let Some(reply) = resolve(resolver, &query, &client, true).await {
            stream.write_all(&reply).await?;
        }
    }
}

/// Periodically drop expired cache entries until the shutdown signal fires
pub fn spawn_cache_sweeper(
    resolver: Arc<Resolver>,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let purged = resolver.cache().purge_expired();
                    debug!(purged, remaining = resolver.cache().len(), "cache sweep");
                }
            }
        }
    })
}

/// Broadcast shutdown once `signal` resolves.
///
/// A failing signal source is logged and the sender is held open, so
/// listeners keep running instead of seeing a closed channel.
pub fn spawn_shutdown_on<F>(signal: F, shutdown_tx: broadcast::Sender<()>) -> JoinHandle<()>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                error!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    })
}
