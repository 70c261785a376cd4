//! Loopback snapshot server for integration tests.
//!
//! Speaks the server side of the client handshake on an ephemeral port and
//! then sends whatever snapshots and control messages a test scripts. There
//! is no simulation behind it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use space_shared::{
    config::ClientConfig,
    net::{encode_to_bytes, ClientId, NetMsg, ReliableConn, ReliableListener, PROTOCOL_VERSION},
    snapshot::StateSnapshot,
};
use tokio::net::UdpSocket;
use tracing::info;

struct Peer {
    reliable: ReliableConn,
    udp_peer: SocketAddr,
}

/// One-client scripted server.
pub struct ScriptedServer {
    tcp: ReliableListener,
    udp: UdpSocket,
    peer: Option<Peer>,
    next_client: u32,
}

/// Binds a server on localhost and returns it with a client config that
/// points at it.
pub async fn bind_ephemeral() -> anyhow::Result<(ScriptedServer, ClientConfig)> {
    // Bind TCP first to get an ephemeral port, then bind UDP to that same port.
    let tcp = ReliableListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
    let addr = tcp.local_addr()?;
    let udp = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()))
        .await
        .context("udp bind")?;

    let cfg = ClientConfig {
        server_addr: addr.to_string(),
        snapshot_poll_ms: 20,
        ..Default::default()
    };

    Ok((
        ScriptedServer {
            tcp,
            udp,
            peer: None,
            next_client: 1,
        },
        cfg,
    ))
}

impl ScriptedServer {
    /// Accepts one client and welcomes it, optionally naming its entity.
    pub async fn accept_one(&mut self, player_id: Option<String>) -> anyhow::Result<ClientId> {
        let (mut conn, peer) = self.tcp.accept().await?;
        match conn.recv().await? {
            NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {}
            other => anyhow::bail!("unexpected handshake msg: {other:?}"),
        }
        let client_udp_port = match conn.recv().await? {
            NetMsg::UdpHello { client_udp_port } => client_udp_port,
            other => anyhow::bail!("expected UdpHello, got {other:?}"),
        };

        let client_id = ClientId(self.next_client);
        self.next_client += 1;
        conn.send(&NetMsg::Welcome {
            client_id,
            player_id,
        })
        .await?;

        let udp_peer = SocketAddr::new(peer.ip(), client_udp_port);
        info!(client_id = ?client_id, %udp_peer, "Scripted client connected");
        self.peer = Some(Peer {
            reliable: conn,
            udp_peer,
        });
        Ok(client_id)
    }

    /// Sends one snapshot datagram to the connected client.
    pub async fn send_snapshot(&self, snapshot: &StateSnapshot) -> anyhow::Result<()> {
        let peer = self.peer.as_ref().context("no client connected")?;
        let bytes = encode_to_bytes(&NetMsg::Snapshot(snapshot.clone()))?;
        self.udp
            .send_to(&bytes, peer.udp_peer)
            .await
            .context("udp send")?;
        Ok(())
    }

    /// Sends raw bytes on the unreliable channel.
    pub async fn send_datagram(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let peer = self.peer.as_ref().context("no client connected")?;
        self.udp
            .send_to(bytes, peer.udp_peer)
            .await
            .context("udp send")?;
        Ok(())
    }

    /// Sends a control message on the reliable channel.
    pub async fn send_reliable(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let peer = self.peer.as_mut().context("no client connected")?;
        peer.reliable.send(msg).await
    }

    /// Drops the client's control stream without a goodbye.
    pub fn drop_client(&mut self) {
        self.peer = None;
    }
}
