use crate::clock::{Clock, SystemClock};
use crate::track::{Track, Zone};
use log::{debug, info};
use shared::{
    round_to, Point3, Snapshot, TrackDescriptor, COLLISION_COOLDOWN_SECS,
    DEFAULT_COLLISION_THRESHOLD, ZONE_RADIUS,
};
use std::time::{Duration, Instant};

/// Mutable per-game state. Replaced wholesale on every start or reset.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub started: bool,
    pub completed: bool,
    pub timing_started: bool,
    pub start_time: Option<Instant>,
    pub elapsed_secs: f64,
    pub collision_count: u32,
    pub is_colliding: bool,
    pub last_collision_time: Option<Instant>,
}

/// One buzz-wire game: the fixed track plus the phase machine
/// `not started -> armed -> timing -> completed`.
///
/// `collision_threshold` must be positive; it is not validated here.
#[derive(Debug, Clone)]
pub struct BuzzWireGame<C: Clock = SystemClock> {
    track: Track,
    start_zone: Zone,
    end_zone: Zone,
    collision_threshold: f64,
    cooldown: Duration,
    state: SessionState,
    clock: C,
}

impl BuzzWireGame<SystemClock> {
    pub fn new(collision_threshold: f64) -> Self {
        Self::with_clock(collision_threshold, SystemClock)
    }
}

impl Default for BuzzWireGame<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_COLLISION_THRESHOLD)
    }
}

impl<C: Clock> BuzzWireGame<C> {
    pub fn with_clock(collision_threshold: f64, clock: C) -> Self {
        Self::with_track(Track::buzz_wire(), collision_threshold, clock)
    }

    pub fn with_track(track: Track, collision_threshold: f64, clock: C) -> Self {
        let start_zone = Zone::new(track.start(), ZONE_RADIUS);
        let end_zone = Zone::new(track.end(), ZONE_RADIUS);

        Self {
            track,
            start_zone,
            end_zone,
            collision_threshold,
            cooldown: Duration::from_secs_f64(COLLISION_COOLDOWN_SECS),
            state: SessionState::default(),
            clock,
        }
    }

    /// Discards any running session and arms a fresh one. The timer does not
    /// run until the player touches the start zone.
    pub fn start(&mut self) {
        self.state = SessionState {
            started: true,
            ..SessionState::default()
        };
    }

    /// Advances the game with one tick of controller positions.
    ///
    /// `positions[0]` is the primary point used for zone checks; every point
    /// takes part in collision detection. An empty slice or an idle/finished
    /// game leaves the state untouched.
    pub fn update(&mut self, positions: &[Point3]) -> Snapshot {
        let primary = match positions.first() {
            Some(p) => *p,
            None => return self.state(),
        };

        if !self.state.started || self.state.completed {
            return self.state();
        }

        if !self.state.timing_started {
            if self.start_zone.contains(&primary) {
                self.state.timing_started = true;
                self.state.start_time = Some(self.clock.now());
                info!("Player touched start zone, timer started");
            }
            return self.state();
        }

        let now = self.clock.now();
        if let Some(start) = self.state.start_time {
            self.state.elapsed_secs = now.saturating_duration_since(start).as_secs_f64();
        }

        let min_distance = positions
            .iter()
            .map(|p| self.track.distance_to(p))
            .fold(f64::INFINITY, f64::min);

        let was_colliding = self.state.is_colliding;
        self.state.is_colliding = min_distance < self.collision_threshold;

        if self.state.is_colliding && !was_colliding && self.cooldown_elapsed(now) {
            self.state.collision_count += 1;
            self.state.last_collision_time = Some(now);
            debug!(
                "Collision #{} at distance {:.4}",
                self.state.collision_count, min_distance
            );
        }

        if self.end_zone.contains(&primary) {
            self.state.completed = true;
            info!(
                "Player reached end zone, final time {:.2}s, collisions {}",
                self.state.elapsed_secs, self.state.collision_count
            );
        }

        self.snapshot(Some(min_distance))
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.state.last_collision_time {
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
            None => true,
        }
    }

    /// Current state without computing any geometry.
    pub fn state(&self) -> Snapshot {
        self.snapshot(None)
    }

    fn snapshot(&self, distance: Option<f64>) -> Snapshot {
        Snapshot {
            game_started: self.state.started,
            game_completed: self.state.completed,
            timing_started: self.state.timing_started,
            elapsed_time: round_to(self.state.elapsed_secs, 2),
            collision_count: self.state.collision_count,
            is_colliding: self.state.is_colliding,
            distance_to_track: distance.map(|d| round_to(d, 4)),
            collision_threshold: self.collision_threshold,
        }
    }

    pub fn track_descriptor(&self) -> TrackDescriptor {
        TrackDescriptor {
            track_points: self.track.points().to_vec(),
            start_zone: self.start_zone.center,
            end_zone: self.end_zone.center,
            zone_radius: self.start_zone.radius,
            collision_threshold: self.collision_threshold,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn session(&self) -> &SessionState {
        &self.state
    }
}
