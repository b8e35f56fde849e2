//! Server network layer: UDP request/response handling for buzz-wire sessions

use crate::clock::Clock;
use crate::session_manager::{SessionError, SessionManager};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{
    ErrorKind, Packet, DEFAULT_COLLISION_THRESHOLD, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Runtime settings, normally assembled from the command line
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_sessions: usize,
    /// Idle sessions are evicted after this long; `None` disables eviction
    pub idle_timeout: Option<Duration>,
    /// Used when a client starts a session without choosing a threshold
    pub default_threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            max_sessions: 32,
            idle_timeout: None,
            default_threshold: DEFAULT_COLLISION_THRESHOLD,
        }
    }
}

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    SessionTimeout { addr: SocketAddr },
}

/// Outgoing packets queued for the sender task
#[derive(Debug)]
pub enum OutgoingMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// UDP server owning every active buzz-wire session
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
    outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new(
                config.max_sessions,
                config.idle_timeout,
            ))),
            config,
            server_tx,
            server_rx,
            outgoing_tx,
            outgoing_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut outgoing_rx =
            std::mem::replace(&mut self.outgoing_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                match message {
                    OutgoingMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that evicts idle sessions, if eviction is configured
    fn spawn_timeout_checker(&self) {
        let Some(timeout) = self.config.idle_timeout else {
            return;
        };

        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();
        let period = timeout.min(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut sessions_guard = sessions.write().await;
                    sessions_guard.check_timeouts()
                };

                for addr in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::SessionTimeout { addr }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outgoing_tx
            .send(OutgoingMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        let response = {
            let mut sessions = self.sessions.write().await;
            handle_request(&mut *sessions, packet, addr, self.config.default_threshold)
        };

        if let Some(response) = response {
            self.send_packet(response, addr);
        }
    }

    /// Main server loop. Requests are handled one at a time in arrival order.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::SessionTimeout { addr } => {
                    self.send_packet(Packet::SessionEnded, addr);
                }
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

fn error_packet(kind: ErrorKind, message: impl Into<String>) -> Packet {
    Packet::Error {
        kind,
        message: message.into(),
    }
}

impl From<SessionError> for Packet {
    fn from(err: SessionError) -> Self {
        let kind = match err {
            SessionError::NoActiveSession => ErrorKind::NoActiveSession,
            SessionError::ServerFull => ErrorKind::ServerFull,
            SessionError::InvalidThreshold(_) => ErrorKind::InvalidThreshold,
            SessionError::InvalidInput(_) => ErrorKind::InvalidInput,
        };
        error_packet(kind, err.to_string())
    }
}

/// Maps one request to its response.
///
/// Returns `None` for packets that are not requests; those are logged and
/// dropped.
pub fn handle_request<C: Clock + Clone>(
    sessions: &mut SessionManager<C>,
    packet: Packet,
    addr: SocketAddr,
    default_threshold: f64,
) -> Option<Packet> {
    let response = match packet {
        Packet::StartSession {
            client_version,
            collision_threshold,
        } => {
            if client_version != PROTOCOL_VERSION {
                warn!(
                    "Client {} uses protocol version {}, expected {}",
                    addr, client_version, PROTOCOL_VERSION
                );
                return Some(error_packet(
                    ErrorKind::UnsupportedVersion,
                    format!("Protocol version mismatch: server speaks {}", PROTOCOL_VERSION),
                ));
            }

            let threshold = collision_threshold.unwrap_or(default_threshold);
            match sessions.start_session(addr, Some(threshold)) {
                Ok((snapshot, track)) => Packet::SessionStarted { snapshot, track },
                Err(e) => e.into(),
            }
        }

        Packet::Update { positions } => match sessions.update(addr, &positions) {
            Ok(snapshot) => Packet::State { snapshot },
            Err(e) => e.into(),
        },

        Packet::GetState => match sessions.state(addr) {
            Ok(snapshot) => Packet::State { snapshot },
            Err(e) => e.into(),
        },

        Packet::ResetSession => match sessions.reset(addr) {
            Ok(snapshot) => Packet::State { snapshot },
            Err(e) => e.into(),
        },

        Packet::GetTrack => Packet::Track {
            track: sessions.track(addr),
        },

        Packet::EndSession => {
            sessions.end_session(addr);
            Packet::SessionEnded
        }

        Packet::Health => Packet::HealthStatus {
            status: "ok".to_string(),
            message: "Buzz wire game server is running".to_string(),
            active_sessions: sessions.len(),
        },

        _ => {
            warn!("Unexpected packet type from client at {}", addr);
            return None;
        }
    };

    Some(response)
}
