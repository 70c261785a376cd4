//! Client session.
//!
//! The client maintains:
//! - A reliable control stream (handshake, player assignment, disconnect)
//! - An unreliable datagram socket carrying snapshots
//! - The entity registry those snapshots are reconciled into
//!
//! Reconciliation and interpolation both run on the caller's task: the
//! frame loop polls snapshots, then advances interpolation, then renders.

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    time::{Duration, Instant},
};

use anyhow::Context;
use space_shared::{
    config::ClientConfig,
    net::{ClientId, MessageSource, NetMsg, ReliableConn, UnreliableConn, PROTOCOL_VERSION},
};
use tokio::{net::TcpStream, sync::mpsc};
use tracing::{debug, info, warn};

use crate::manager::EntityManager;

/// Upper bound on snapshots applied in one poll, so a flood cannot starve
/// the frame loop.
pub const MAX_SNAPSHOTS_PER_POLL: usize = 64;

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake done, snapshots flowing.
    Connected,
    /// Server closed the session or the control stream dropped.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    pub client_id: ClientId,
    pub state: ClientState,
    pub entities: EntityManager,

    reliable: mpsc::Receiver<NetMsg>,
    snapshots: Box<dyn MessageSource>,
    poll_timeout: Duration,
    snapshots_applied: u64,

    /// Server messages to display.
    pub server_messages: Vec<String>,
}

impl GameClient {
    /// Connects to a server and performs the handshake.
    pub async fn connect(cfg: &ClientConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, "Connecting to server");

        // Bind UDP first so we can tell the server where to send snapshots.
        let unreliable = UnreliableConn::connect(udp_bind_addr(server_addr), server_addr).await?;
        let client_udp_port = unreliable.local_addr().context("udp local_addr")?.port();

        let stream = TcpStream::connect(server_addr)
            .await
            .context("tcp connect")?;
        let mut reliable = ReliableConn::new(stream);

        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;
        reliable.send(&NetMsg::UdpHello { client_udp_port }).await?;

        let (client_id, player_id) = match reliable.recv().await? {
            NetMsg::Welcome {
                client_id,
                player_id,
            } => (client_id, player_id),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(
            client_id = ?client_id,
            player_id = ?player_id,
            snapshots_from = %unreliable.peer_addr(),
            "Connected to server"
        );

        Ok(Self::from_parts(
            client_id,
            player_id,
            spawn_reliable_reader(reliable),
            Box::new(unreliable),
            cfg,
        ))
    }

    /// Assembles a session from already-established channels.
    pub fn from_parts(
        client_id: ClientId,
        player_id: Option<String>,
        reliable: mpsc::Receiver<NetMsg>,
        snapshots: Box<dyn MessageSource>,
        cfg: &ClientConfig,
    ) -> Self {
        let mut entities = EntityManager::new(cfg.interpolation_window());
        if let Some(id) = player_id {
            entities.set_player_id(id);
        }
        Self {
            client_id,
            state: ClientState::Connected,
            entities,
            reliable,
            snapshots,
            poll_timeout: cfg.snapshot_poll(),
            snapshots_applied: 0,
            server_messages: Vec::new(),
        }
    }

    /// Handles every control message that has arrived, without waiting.
    pub fn poll_reliable(&mut self) {
        loop {
            match self.reliable.try_recv() {
                Ok(msg) => self.handle_reliable_message(msg),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if self.state != ClientState::Disconnected {
                        warn!("Reliable connection lost");
                        self.disconnect();
                    }
                    break;
                }
            }
        }
    }

    fn handle_reliable_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::AssignPlayer { player_id } => {
                self.entities.set_player_id(player_id);
            }
            NetMsg::Snapshot(snapshot) => {
                // Unusual but harmless: same treatment as a datagram.
                self.entities.update_from_state(&snapshot, Instant::now());
                self.snapshots_applied += 1;
            }
            NetMsg::ServerPrint { message } => {
                info!(message = %message, "Server message");
                self.server_messages.push(message);
            }
            NetMsg::Disconnect { reason } => {
                info!(reason = %reason, "Disconnected from server");
                self.disconnect();
            }
            other => {
                debug!(?other, "Unhandled reliable message");
            }
        }
    }

    /// Applies every snapshot that is ready, oldest first. Returns how many
    /// were applied.
    pub async fn poll_snapshots(&mut self) -> anyhow::Result<usize> {
        let mut applied = 0;
        while applied < MAX_SNAPSHOTS_PER_POLL {
            match self.snapshots.recv_timeout(self.poll_timeout).await? {
                Some(NetMsg::Snapshot(snapshot)) => {
                    self.entities.update_from_state(&snapshot, Instant::now());
                    applied += 1;
                }
                Some(other) => {
                    debug!(?other, "Unexpected UDP message");
                }
                None => break,
            }
        }
        self.snapshots_applied += applied as u64;
        Ok(applied)
    }

    /// Advances interpolation for one rendered frame.
    pub fn frame(&mut self, now: Instant) {
        self.entities.update_interpolation(now);
    }

    /// Ends the session locally and empties the registry.
    pub fn disconnect(&mut self) {
        self.state = ClientState::Disconnected;
        self.entities.clear();
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }
}

/// Wildcard address of the server's family, so snapshots from a remote
/// server are not filtered out by a loopback-only bind.
fn udp_bind_addr(server: SocketAddr) -> SocketAddr {
    let ip = match server {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

/// Moves the control stream onto its own task so frame-loop polling never
/// cancels a half-read frame.
fn spawn_reliable_reader(mut conn: ReliableConn) -> mpsc::Receiver<NetMsg> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        loop {
            match conn.recv().await {
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Reliable reader stopped");
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use space_shared::{
        math::Vec3,
        snapshot::{EntityPayload, StateSnapshot},
    };

    use super::*;

    /// Hands out queued messages, then reports nothing ready.
    struct Scripted(VecDeque<NetMsg>);

    #[async_trait]
    impl MessageSource for Scripted {
        async fn recv_timeout(&mut self, _timeout: Duration) -> anyhow::Result<Option<NetMsg>> {
            Ok(self.0.pop_front())
        }
    }

    fn session(msgs: Vec<NetMsg>) -> (GameClient, mpsc::Sender<NetMsg>) {
        let (tx, rx) = mpsc::channel(8);
        let client = GameClient::from_parts(
            ClientId(1),
            Some("me".into()),
            rx,
            Box::new(Scripted(msgs.into())),
            &ClientConfig::default(),
        );
        (client, tx)
    }

    #[tokio::test]
    async fn snapshots_reconcile_in_arrival_order() -> anyhow::Result<()> {
        let (mut client, _tx) = session(vec![
            NetMsg::Snapshot(StateSnapshot::new(vec![
                EntityPayload::new("me").with_position(1.0, 0.0, 0.0),
                EntityPayload::new("npc"),
            ])),
            NetMsg::ServerPrint {
                message: "stray".into(),
            },
            NetMsg::Snapshot(StateSnapshot::new(vec![
                EntityPayload::new("me").with_position(2.0, 0.0, 0.0)
            ])),
        ]);

        assert_eq!(client.poll_snapshots().await?, 2);
        assert_eq!(client.snapshots_applied(), 2);
        assert_eq!(client.entities.len(), 1);

        let me = client.entities.player_entity().expect("player present");
        assert_eq!(me.target_position(), Vec3::new(2.0, 0.0, 0.0));

        client.frame(Instant::now() + Duration::from_secs(1));
        assert_eq!(
            client.entities.position("me"),
            Some(Vec3::new(2.0, 0.0, 0.0))
        );
        Ok(())
    }

    #[tokio::test]
    async fn control_messages_assign_and_disconnect() -> anyhow::Result<()> {
        let (mut client, tx) = session(vec![NetMsg::Snapshot(StateSnapshot::new(vec![
            EntityPayload::new("me"),
            EntityPayload::new("alt"),
        ]))]);
        client.poll_snapshots().await?;

        tx.send(NetMsg::AssignPlayer {
            player_id: "alt".into(),
        })
        .await?;
        tx.send(NetMsg::ServerPrint {
            message: "welcome".into(),
        })
        .await?;
        client.poll_reliable();
        assert_eq!(client.entities.player_entity().map(|e| e.id()), Some("alt"));
        assert_eq!(client.server_messages, vec!["welcome".to_string()]);

        tx.send(NetMsg::Disconnect {
            reason: "bye".into(),
        })
        .await?;
        client.poll_reliable();
        assert_eq!(client.state, ClientState::Disconnected);
        assert!(client.entities.is_empty());
        Ok(())
    }

    #[test]
    fn udp_binds_wildcard_of_server_family() {
        let v4 = udp_bind_addr("203.0.113.5:40000".parse().unwrap());
        assert_eq!(v4, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

        let v6 = udp_bind_addr("[2001:db8::1]:40000".parse().unwrap());
        assert_eq!(v6, SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)));
    }

    #[tokio::test]
    async fn dropped_control_stream_disconnects() {
        let (mut client, tx) = session(Vec::new());
        drop(tx);
        client.poll_reliable();
        assert_eq!(client.state, ClientState::Disconnected);
    }
}
