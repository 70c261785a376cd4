//! Networking primitives.
//!
//! Goals:
//! - Provide a simple reliable (TCP) and unreliable (UDP) channel.
//! - Provide the handshake and snapshot message types.
//! - Keep serialization explicit and versionable.
//!
//! Snapshots travel on the unreliable channel. Delivery is best-effort and
//! assumed in order; nothing here retransmits or reorders.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
    time,
};
use tracing::warn;

use crate::snapshot::StateSnapshot;

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram the unreliable channel accepts.
pub const MAX_DATAGRAM: usize = 64 * 1024;

/// Identifies a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Client announces its UDP port to the server.
    UdpHello {
        client_udp_port: u16,
    },
    /// `player_id` names the entity this client controls, when the server
    /// already knows it.
    Welcome {
        client_id: ClientId,
        #[serde(default)]
        player_id: Option<String>,
    },

    // ─── Session ───
    /// Server (re)assigns the locally controlled entity.
    AssignPlayer {
        player_id: String,
    },
    /// Server -> client: authoritative view of the entities in scope.
    Snapshot(StateSnapshot),

    // ─── Console ───
    /// Server -> client: print message to console.
    ServerPrint {
        message: String,
    },

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

/// Anything that yields server messages without blocking past a deadline.
///
/// The client session reads snapshots through this seam so the registry
/// can be fed from a socket or from a scripted source.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits at most `timeout` for one message. `Ok(None)` means nothing
    /// usable arrived in time.
    async fn recv_timeout(&mut self, timeout: Duration) -> anyhow::Result<Option<NetMsg>>;
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.stream.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .context("tcp read len")?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
        Ok(msg)
    }
}

/// Unreliable channel over UDP.
#[derive(Debug)]
pub struct UnreliableConn {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UnreliableConn {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self { socket, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl MessageSource for UnreliableConn {
    /// A datagram that does not decode is dropped with a warning rather
    /// than failing the session.
    async fn recv_timeout(&mut self, timeout: Duration) -> anyhow::Result<Option<NetMsg>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => match decode_from_bytes(&buf[..n]) {
                Ok(msg) => Ok(Some(msg)),
                Err(e) => {
                    warn!(error = %e, bytes = n, "Dropping undecodable datagram");
                    Ok(None)
                }
            },
            Ok(Err(e)) => Err(e).context("udp recv"),
            Err(_) => Ok(None),
        }
    }
}

/// TCP listener, used by servers and by loopback test harnesses.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::EntityPayload;

    #[test]
    fn welcome_without_player_id_decodes() {
        let msg = decode_from_bytes(br#"{"Welcome":{"client_id":3}}"#).unwrap();
        assert_eq!(
            msg,
            NetMsg::Welcome {
                client_id: ClientId(3),
                player_id: None,
            }
        );
    }

    #[test]
    fn snapshot_message_survives_codec() {
        let msg = NetMsg::Snapshot(StateSnapshot::new(vec![
            EntityPayload::new("a").with_position(1.0, 2.0, 3.0),
        ]));
        let bytes = encode_to_bytes(&msg).unwrap();
        assert_eq!(decode_from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn snapshot_with_bad_entry_still_decodes() {
        let msg = decode_from_bytes(
            br#"{"Snapshot":{"entities":[{"id":7},{"id":"good","position":{"x":1.0}}]}}"#,
        )
        .unwrap();
        let snap = match msg {
            NetMsg::Snapshot(snap) => snap,
            other => panic!("expected Snapshot, got {other:?}"),
        };
        let ids: Vec<Option<&str>> = snap.entities().iter().map(|e| e.entity_id()).collect();
        assert_eq!(ids, vec![None, Some("good")]);
    }

    #[tokio::test]
    async fn garbage_datagram_is_dropped_not_fatal() -> anyhow::Result<()> {
        let server = UdpSocket::bind("127.0.0.1:0").await?;
        let server_addr = server.local_addr()?;
        let mut conn = UnreliableConn::connect("127.0.0.1:0".parse()?, server_addr).await?;
        let client_addr = conn.local_addr()?;

        server.send_to(b"not json", client_addr).await?;
        let got = conn.recv_timeout(Duration::from_millis(500)).await?;
        assert!(got.is_none());

        let ping = NetMsg::ServerPrint {
            message: "hi".into(),
        };
        server.send_to(&encode_to_bytes(&ping)?, client_addr).await?;
        let got = conn.recv_timeout(Duration::from_millis(500)).await?;
        assert_eq!(got, Some(ping));
        Ok(())
    }
}
