//! Connection seam between the resolver and the network.
//!
//! The resolver never opens sockets itself. It asks a [`Connector`] for the
//! [`Dialer`] responsible for a target, and that dialer decides which hop or
//! proxy chain carries the bytes.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{lookup_host, TcpStream, UdpSocket};

/// Transport used for one upstream exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Udp,
}

impl Network {
    /// TCP unless the client did not ask for it and the dialer talks straight
    /// to the network; proxy chains are assumed to carry TCP only.
    pub fn select(prefer_tcp: bool, direct: bool) -> Network {
        if !prefer_tcp && direct {
            Network::Udp
        } else {
            Network::Tcp
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Udp => write!(f, "udp"),
        }
    }
}

/// A bidirectional byte stream returned by a dialer.
///
/// For UDP each write is sent as one datagram and each read yields one datagram.
pub trait Conn: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Conn for T {}

#[async_trait]
pub trait Dialer: Send + Sync {
    /// Whether connections go straight to the network rather than through a proxy
    fn is_direct(&self) -> bool;

    async fn dial(&self, network: Network, addr: &str) -> io::Result<Box<dyn Conn>>;
}

pub trait Connector: Send + Sync {
    /// The dialer that should carry traffic for `target` (`host:port`)
    fn next_dialer(&self, target: &str) -> Arc<dyn Dialer>;
}

/// Dials upstream servers directly
#[derive(Debug, Default, Clone)]
pub struct DirectConnector {
    dialer: Arc<DirectDialer>,
}

impl Connector for DirectConnector {
    fn next_dialer(&self, _target: &str) -> Arc<dyn Dialer> {
        self.dialer.clone()
    }
}

#[derive(Debug, Default)]
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    fn is_direct(&self) -> bool {
        true
    }

    async fn dial(&self, network: Network, addr: &str) -> io::Result<Box<dyn Conn>> {
        match network {
            Network::Tcp => {
                let stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            Network::Udp => Ok(Box::new(UdpConn::connect(addr).await?)),
        }
    }
}

/// A connected UDP socket exposed as a stream of datagrams
#[derive(Debug)]
pub struct UdpConn {
    socket: UdpSocket,
}

impl UdpConn {
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let target = lookup_host(addr).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", addr))
        })?;

        // Bind to ephemeral port (0 = OS assigns) in the target's family
        let bind_addr: SocketAddr = if target.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;
        Ok(Self { socket })
    }
}

impl AsyncRead for UdpConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.socket.poll_recv(cx, buf)
    }
}

impl AsyncWrite for UdpConn {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.socket.poll_send(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
