//! Server network layer handling UDP communications and the admission loop

use crate::admission::{AdmissionConfig, AdmissionPipeline, SubmitError};
use crate::leaderboard::LeaderboardStore;
use crate::utils::{client_identifier, get_timestamp};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Stops a running [`Server`] from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    /// Returns false if the server loop is already gone
    pub fn shutdown(&self) -> bool {
        self.server_tx.send(ServerMessage::Shutdown).is_ok()
    }
}

/// Main server coordinating networking and submission admission
///
/// The admission pipeline, and with it the rate limiter state, is owned by
/// the main loop alone. Network tasks only move bytes, so every rate limit
/// check runs to completion before the next one starts.
pub struct Server<S: LeaderboardStore> {
    socket: Arc<UdpSocket>,
    pipeline: AdmissionPipeline<S>,
    sweep_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl<S: LeaderboardStore> Server<S> {
    pub async fn new(
        addr: &str,
        config: AdmissionConfig,
        store: S,
        sweep_interval: Duration,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            pipeline: AdmissionPipeline::new(config, store),
            sweep_interval,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    pub fn pipeline(&self) -> &AdmissionPipeline<S> {
        &self.pipeline
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Failed to deserialize packet from {}: {}", addr, e);
                        }
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) -> Option<JoinHandle<()>> {
        let socket = Arc::clone(&self.socket);
        let mut outbound_rx = self.outbound_rx.take()?;

        Some(tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        }))
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Computes the reply to one request packet
    ///
    /// Returns `None` for packets a client should never send.
    pub fn respond(&mut self, packet: Packet, client_id: &str, now: u64) -> Option<Packet> {
        match packet {
            Packet::Submit(attempt) => Some(match self.pipeline.submit(client_id, &attempt, now) {
                Ok(accepted) => {
                    debug!(
                        "Record {} diagnostics: {:.2} moves/s, max score {}",
                        accepted.id,
                        accepted.diagnostics.moves_per_second,
                        accepted.diagnostics.max_possible_score
                    );
                    Packet::Accepted { id: accepted.id.0 }
                }
                Err(e) => rejection_packet(&e),
            }),

            Packet::ListTop { limit } => Some(match self.pipeline.list_top(limit) {
                Ok(entries) => Packet::Leaderboard { entries },
                Err(e) => {
                    error!("Leaderboard query failed: {}", e);
                    rejection_packet(&SubmitError::Storage(e))
                }
            }),

            Packet::Ping => Some(Packet::Pong),

            _ => None,
        }
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let client_id = client_identifier(addr);

        match self.respond(packet, &client_id, get_timestamp()) {
            Some(response) => self.send_packet(response, addr),
            None => warn!("Unexpected packet type from client at {}", addr),
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        // Initialize concurrent tasks
        let receiver = self.spawn_network_receiver();
        let sender = self.spawn_network_sender();

        let mut sweep_timer = interval(self.sweep_interval);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Periodically forget clients with no live attempts
                _ = sweep_timer.tick() => {
                    let evicted = self.pipeline.sweep_rate_limiter(get_timestamp());
                    debug!(
                        "Rate limiter sweep: {} evicted, {} tracked",
                        evicted,
                        self.pipeline.rate_limiter().len()
                    );
                },
            }
        }

        receiver.abort();
        if let Some(sender) = sender {
            sender.abort();
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), ServerError> {
    let data = packet.encode()?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Wire form of a failed submission
pub fn rejection_packet(error: &SubmitError) -> Packet {
    let (detail, diagnostics) = match error {
        SubmitError::Rejected(rejection) => (
            rejection.detail().map(str::to_string),
            rejection.diagnostics(),
        ),
        SubmitError::Storage(_) => (None, None),
    };

    Packet::Rejected {
        reason: error.code().to_string(),
        detail,
        diagnostics,
        retryable: error.is_retryable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Rejection;
    use crate::leaderboard::{MemoryStore, StoreError};
    use crate::plausibility::PlausibilityFailure;
    use shared::{Event, SubmissionAttempt};
    use std::net::{IpAddr, Ipv4Addr};

    const NOW: u64 = 1_700_000_000_000;

    async fn create_test_server() -> Server<MemoryStore> {
        Server::new(
            "127.0.0.1:0",
            AdmissionConfig::default(),
            MemoryStore::new(),
            Duration::from_secs(30),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_server_message_creation() {
        let packet = Packet::Ping;
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        let msg = ServerMessage::PacketReceived {
            packet: packet.clone(),
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { packet: p, addr: a } => {
                assert_eq!(a, addr);
                assert_eq!(p, Packet::Ping);
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let handle = ShutdownHandle { server_tx: tx };

        assert!(handle.shutdown());
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Shutdown)));

        drop(rx);
        assert!(!handle.shutdown());
    }

    #[tokio::test]
    async fn test_respond_accepts_submission() {
        let mut server = create_test_server().await;
        let attempt = SubmissionAttempt::new("Al", 10.0, 5000.0, vec![Event::movement(0.0)]);

        let response = server.respond(Packet::Submit(attempt), "10.0.0.1", NOW);
        assert_eq!(response, Some(Packet::Accepted { id: 1 }));
        assert_eq!(server.pipeline().store().len(), 1);
    }

    #[tokio::test]
    async fn test_respond_rejects_bad_name() {
        let mut server = create_test_server().await;
        let attempt = SubmissionAttempt::new("A", 10.0, 5000.0, vec![]);

        match server.respond(Packet::Submit(attempt), "10.0.0.1", NOW) {
            Some(Packet::Rejected {
                reason,
                detail,
                diagnostics,
                retryable,
            }) => {
                assert_eq!(reason, "bad_name");
                assert!(detail.is_none());
                assert!(diagnostics.is_none());
                assert!(!retryable);
            }
            other => panic!("Unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_lists_leaderboard() {
        let mut server = create_test_server().await;
        for (i, score) in [5.0, 30.0, 12.0].into_iter().enumerate() {
            let attempt = SubmissionAttempt::new("runner", score, 5000.0, vec![]);
            server.respond(Packet::Submit(attempt), "10.0.0.1", NOW + i as u64);
        }

        match server.respond(Packet::ListTop { limit: None }, "10.0.0.2", NOW) {
            Some(Packet::Leaderboard { entries }) => {
                let scores: Vec<i64> = entries.iter().map(|e| e.score).collect();
                assert_eq!(scores, vec![30, 12, 5]);
            }
            other => panic!("Unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_ping_and_unexpected() {
        let mut server = create_test_server().await;
        assert_eq!(server.respond(Packet::Ping, "c", NOW), Some(Packet::Pong));
        assert_eq!(server.respond(Packet::Pong, "c", NOW), None);
        assert_eq!(server.respond(Packet::Accepted { id: 3 }, "c", NOW), None);
    }

    #[test]
    fn test_rejection_packet_plausibility() {
        let error = SubmitError::Rejected(Rejection::PlausibilityFailed {
            reason: PlausibilityFailure::TooManyMovesPerSecond,
            diagnostics: Some(shared::Diagnostics {
                moves_per_second: 20.0,
                max_entities: 5,
                max_possible_score: 25,
            }),
        });

        match rejection_packet(&error) {
            Packet::Rejected {
                reason,
                detail,
                diagnostics,
                retryable,
            } => {
                assert_eq!(reason, "plausibility_failed");
                assert_eq!(detail.as_deref(), Some("too many moves per second"));
                assert_eq!(diagnostics.unwrap().max_possible_score, 25);
                assert!(!retryable);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_rejection_packet_storage() {
        let error = SubmitError::Storage(StoreError::Unavailable("down".to_string()));

        match rejection_packet(&error) {
            Packet::Rejected {
                reason,
                detail,
                retryable,
                ..
            } => {
                assert_eq!(reason, "storage_error");
                assert!(detail.is_none());
                assert!(retryable);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = create_test_server().await;
        let addr = tokio_test::assert_ok!(server.local_addr());
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let result = Server::new(
            "not-an-address",
            AdmissionConfig::default(),
            MemoryStore::new(),
            Duration::from_secs(30),
        )
        .await;

        assert!(matches!(result, Err(ServerError::Io(_))));
    }
}
