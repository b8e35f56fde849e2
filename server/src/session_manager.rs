//! Per-client game sessions for the buzz-wire server
//!
//! Every client address owns at most one [`BuzzWireGame`]. This module handles:
//! - Session lifecycle (start, reset, end, optional idle eviction)
//! - Capacity limits on concurrently active sessions
//! - Input normalization at the boundary, so games only ever see well-formed points
//!
//! All mutation goes through `&mut self`, so a single owner (the network loop)
//! serializes every transition of a given session.

use crate::clock::{Clock, SystemClock};
use crate::game::BuzzWireGame;
use log::info;
use shared::{
    InputError, PositionInput, Snapshot, TrackDescriptor, DEFAULT_COLLISION_THRESHOLD,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Game not started")]
    NoActiveSession,
    #[error("Server full")]
    ServerFull,
    #[error("collision threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),
    #[error("invalid positions: {0}")]
    InvalidInput(#[from] InputError),
}

/// A client's game plus connection metadata
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock> {
    /// Unique session identifier assigned by the server
    pub id: u32,
    /// Address responses are sent to
    pub addr: SocketAddr,
    /// Last time this client sent any request, as read from the manager's clock
    pub last_seen: Instant,
    pub game: BuzzWireGame<C>,
}

impl<C: Clock> Session<C> {
    pub fn new(id: u32, addr: SocketAddr, game: BuzzWireGame<C>, now: Instant) -> Self {
        Self {
            id,
            addr,
            last_seen: now,
            game,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// Owns all active sessions, indexed by client address
///
/// Sessions are created with a clone of the manager's clock, so tests can
/// drive every game from one [`crate::clock::ManualClock`].
pub struct SessionManager<C: Clock + Clone = SystemClock> {
    sessions: HashMap<SocketAddr, Session<C>>,
    next_session_id: u32,
    max_sessions: usize,
    /// `None` keeps idle sessions forever
    idle_timeout: Option<Duration>,
    clock: C,
}

impl SessionManager<SystemClock> {
    pub fn new(max_sessions: usize, idle_timeout: Option<Duration>) -> Self {
        Self::with_clock(max_sessions, idle_timeout, SystemClock)
    }
}

impl<C: Clock + Clone> SessionManager<C> {
    pub fn with_clock(max_sessions: usize, idle_timeout: Option<Duration>, clock: C) -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 1,
            max_sessions,
            idle_timeout,
            clock,
        }
    }

    /// Creates a fresh, started game for `addr`, replacing any previous one.
    ///
    /// Returns the initial snapshot and the track the client should render.
    pub fn start_session(
        &mut self,
        addr: SocketAddr,
        collision_threshold: Option<f64>,
    ) -> Result<(Snapshot, TrackDescriptor), SessionError> {
        let threshold = collision_threshold.unwrap_or(DEFAULT_COLLISION_THRESHOLD);
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(SessionError::InvalidThreshold(threshold));
        }

        let replacing = self.sessions.contains_key(&addr);
        if !replacing && self.sessions.len() >= self.max_sessions {
            return Err(SessionError::ServerFull);
        }

        let mut game = BuzzWireGame::with_clock(threshold, self.clock.clone());
        game.start();

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let snapshot = game.state();
        let track = game.track_descriptor();

        info!(
            "Session {} started for {} (threshold {}, {} track points)",
            session_id,
            addr,
            threshold,
            track.track_points.len()
        );
        let now = self.clock.now();
        self.sessions.insert(addr, Session::new(session_id, addr, game, now));

        Ok((snapshot, track))
    }

    pub fn update(
        &mut self,
        addr: SocketAddr,
        positions: &PositionInput,
    ) -> Result<Snapshot, SessionError> {
        let session = self.session_mut(addr)?;
        let points = positions.normalize()?;
        Ok(session.game.update(&points))
    }

    pub fn state(&mut self, addr: SocketAddr) -> Result<Snapshot, SessionError> {
        Ok(self.session_mut(addr)?.game.state())
    }

    /// Restarts the existing game for `addr`; the track is kept.
    pub fn reset(&mut self, addr: SocketAddr) -> Result<Snapshot, SessionError> {
        let session = self.session_mut(addr)?;
        session.game.start();
        info!("Session {} reset", session.id);
        Ok(session.game.state())
    }

    /// Track of the client's session, or of a default game when there is none.
    pub fn track(&self, addr: SocketAddr) -> TrackDescriptor {
        match self.sessions.get(&addr) {
            Some(session) => session.game.track_descriptor(),
            None => BuzzWireGame::with_clock(DEFAULT_COLLISION_THRESHOLD, self.clock.clone())
                .track_descriptor(),
        }
    }

    pub fn end_session(&mut self, addr: SocketAddr) -> bool {
        if let Some(session) = self.sessions.remove(&addr) {
            info!("Session {} ended", session.id);
            true
        } else {
            false
        }
    }

    fn session_mut(&mut self, addr: SocketAddr) -> Result<&mut Session<C>, SessionError> {
        let now = self.clock.now();
        let session = self
            .sessions
            .get_mut(&addr)
            .ok_or(SessionError::NoActiveSession)?;
        session.touch(now);
        Ok(session)
    }

    /// Removes sessions idle for longer than the configured timeout and
    /// returns their addresses. Does nothing when no timeout is configured.
    pub fn check_timeouts(&mut self) -> Vec<SocketAddr> {
        let timeout = match self.idle_timeout {
            Some(timeout) => timeout,
            None => return Vec::new(),
        };

        let now = self.clock.now();
        let timed_out: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_timed_out(now, timeout))
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &timed_out {
            if let Some(session) = self.sessions.remove(addr) {
                info!("Session {} for {} timed out", session.id, addr);
            }
        }

        timed_out
    }

    pub fn session(&self, addr: SocketAddr) -> Option<&Session<C>> {
        self.sessions.get(&addr)
    }

    /// Returns the number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
