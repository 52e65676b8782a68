use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::connector::{Conn, Network};
use crate::dns_message::FRAME_PREFIX_LEN;

/// Largest datagram accepted from a UDP upstream
pub const UDP_MAX_LEN: usize = 4096;

/// One request/response round trip over an already dialed connection.
/// `req` and the returned reply are both length-prefixed; the connection is
/// closed when this returns.
pub async fn exchange(network: Network, conn: Box<dyn Conn>, req: &[u8]) -> io::Result<Bytes> {
    match network {
        Network::Tcp => exchange_tcp(conn, req).await,
        Network::Udp => exchange_udp(conn, req).await,
    }
}

/// TCP carries the length prefix on the wire, so the request goes out as given
pub async fn exchange_tcp<C: Conn + ?Sized>(mut conn: Box<C>, req: &[u8]) -> io::Result<Bytes> {
    conn.write_all(req).await?;
    conn.flush().await?;

    let len = conn.read_u16().await?;

    let mut reply = BytesMut::zeroed(FRAME_PREFIX_LEN + len as usize);
    reply[..FRAME_PREFIX_LEN].copy_from_slice(&len.to_be_bytes());
    conn.read_exact(&mut reply[FRAME_PREFIX_LEN..]).await?;

    Ok(reply.freeze())
}

/// UDP has no framing: strip the local prefix going out, add one coming back
pub async fn exchange_udp<C: Conn + ?Sized>(mut conn: Box<C>, req: &[u8]) -> io::Result<Bytes> {
    let msg = req.get(FRAME_PREFIX_LEN..).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "request without length prefix")
    })?;
    conn.write_all(msg).await?;

    let mut datagram = vec![0u8; UDP_MAX_LEN];
    let n = conn.read(&mut datagram).await?;
    if n == 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }

    let mut reply = BytesMut::with_capacity(FRAME_PREFIX_LEN + n);
    reply.put_u16(n as u16);
    reply.put_slice(&datagram[..n]);
    Ok(reply.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_tcp_round_trip_keeps_framing() {
        let (client, mut server) = duplex(1024);

        let upstream = tokio::spawn(async move {
            let len = server.read_u16().await.unwrap();
            let mut msg = vec![0u8; len as usize];
            server.read_exact(&mut msg).await.unwrap();
            assert_eq!(msg, b"query");

            // Reply split across writes; the exchanger must reassemble it
            server.write_all(&[0, 6, b'a', b'n']).await.unwrap();
            server.write_all(b"swer").await.unwrap();
        });

        let reply = exchange(Network::Tcp, Box::new(client), b"\x00\x05query")
            .await
            .unwrap();
        upstream.await.unwrap();

        assert_eq!(&reply[..], b"\x00\x06answer");
    }

    #[tokio::test]
    async fn test_tcp_short_reply_is_an_error() {
        let (client, mut server) = duplex(1024);

        tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let _ = server.read(&mut buf).await;
            server.write_all(&[0, 10, 1, 2]).await.unwrap();
            // dropping closes the stream
        });

        let err = exchange_tcp(Box::new(client), b"\x00\x01q").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_udp_strips_and_restores_prefix() {
        let (client, mut server) = duplex(UDP_MAX_LEN);

        let upstream = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"query");
            server.write_all(b"reply!").await.unwrap();
        });

        let reply = exchange(Network::Udp, Box::new(client), b"\x00\x05query")
            .await
            .unwrap();
        upstream.await.unwrap();

        assert_eq!(&reply[..], b"\x00\x06reply!");
    }

    #[tokio::test]
    async fn test_udp_closed_without_reply() {
        let (client, server) = duplex(64);
        drop(server);

        assert!(exchange_udp(Box::new(client), b"\x00\x01q").await.is_err());
    }
}
