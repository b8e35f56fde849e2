use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_COLLISION_THRESHOLD: f64 = 0.05;
pub const ZONE_RADIUS: f64 = 0.1;
pub const COLLISION_COOLDOWN_SECS: f64 = 0.5;
pub const DEGENERATE_SEGMENT_EPSILON: f64 = 1e-10;
/// Largest UDP payload; receive buffers are sized to hold any datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// The fixed wire path, in Unity coordinates (Y up). The first point is the
/// start zone and the last point is the end zone.
pub const BUZZ_WIRE_TRACK: [[f64; 3]; 14] = [
    [-0.5, 1.0, 0.0],
    // rising to the right
    [-0.3, 1.1, 0.0],
    [-0.1, 1.2, 0.05],
    // wave
    [0.0, 1.15, 0.1],
    [0.1, 1.25, 0.05],
    [0.2, 1.1, 0.0],
    // forward bend
    [0.3, 1.15, -0.1],
    [0.4, 1.2, -0.15],
    // spiral climb
    [0.5, 1.3, -0.1],
    [0.55, 1.35, 0.0],
    [0.5, 1.4, 0.1],
    // descent to the finish
    [0.6, 1.3, 0.1],
    [0.7, 1.2, 0.05],
    [0.8, 1.1, 0.0],
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: &Point3) -> Point3 {
        Point3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: &Point3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        self.sub(other).length()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Point3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Shortest distance from `point` to the segment `start -> end`.
///
/// The point is projected onto the segment's supporting line and the
/// projection parameter is clamped to `[0, 1]`, so points beyond either end
/// measure against the nearest endpoint. Segments shorter than
/// [`DEGENERATE_SEGMENT_EPSILON`] (squared) are treated as a single point.
pub fn point_to_segment_distance(point: &Point3, start: &Point3, end: &Point3) -> f64 {
    let v = end.sub(start);
    let w = point.sub(start);

    let v_dot_v = v.dot(&v);
    if v_dot_v < DEGENERATE_SEGMENT_EPSILON {
        return w.length();
    }

    let t = (w.dot(&v) / v_dot_v).clamp(0.0, 1.0);
    let closest = Point3::new(start.x + t * v.x, start.y + t * v.y, start.z + t * v.z);

    point.distance(&closest)
}

/// Minimum distance from `point` to the polyline through `points`.
///
/// Returns `f64::INFINITY` when there are fewer than two points.
pub fn distance_to_polyline(point: &Point3, points: &[Point3]) -> f64 {
    points
        .windows(2)
        .map(|segment| point_to_segment_distance(point, &segment[0], &segment[1]))
        .fold(f64::INFINITY, f64::min)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no positions supplied")]
    Empty,
    #[error("position {index} has {len} components, expected 3")]
    WrongArity { index: usize, len: usize },
    #[error("position {index} contains a non-finite coordinate")]
    NonFinite { index: usize },
}

/// Controller positions as sent by a client: either one `[x, y, z]` or a list
/// of them. Every update goes through [`PositionInput::normalize`] before it
/// reaches the game.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum PositionInput {
    Single(Vec<f64>),
    Multiple(Vec<Vec<f64>>),
}

impl PositionInput {
    pub fn single(point: Point3) -> Self {
        PositionInput::Single(point.to_array().to_vec())
    }

    pub fn multiple(points: &[Point3]) -> Self {
        PositionInput::Multiple(points.iter().map(|p| p.to_array().to_vec()).collect())
    }

    /// Produces a non-empty, ordered list of finite points. The first entry is
    /// the primary point used for zone checks.
    pub fn normalize(&self) -> Result<Vec<Point3>, InputError> {
        let raw: Vec<&[f64]> = match self {
            PositionInput::Single(coords) => vec![coords.as_slice()],
            PositionInput::Multiple(list) => list.iter().map(Vec::as_slice).collect(),
        };

        if raw.is_empty() {
            return Err(InputError::Empty);
        }

        raw.into_iter()
            .enumerate()
            .map(|(index, coords)| {
                let point = match coords {
                    [x, y, z] => Point3::new(*x, *y, *z),
                    _ => {
                        return Err(InputError::WrongArity {
                            index,
                            len: coords.len(),
                        })
                    }
                };
                if point.is_finite() {
                    Ok(point)
                } else {
                    Err(InputError::NonFinite { index })
                }
            })
            .collect()
    }
}

/// Game state as reported to the client after every request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub game_started: bool,
    pub game_completed: bool,
    pub timing_started: bool,
    /// Seconds since the start zone was touched, rounded to 2 decimals.
    pub elapsed_time: f64,
    pub collision_count: u32,
    pub is_colliding: bool,
    /// Rounded to 4 decimals; `None` when no geometry was computed.
    pub distance_to_track: Option<f64>,
    pub collision_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrackDescriptor {
    pub track_points: Vec<Point3>,
    pub start_zone: Point3,
    pub end_zone: Point3,
    pub zone_radius: f64,
    pub collision_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoActiveSession,
    InvalidInput,
    InvalidThreshold,
    ServerFull,
    UnsupportedVersion,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    StartSession {
        client_version: u32,
        collision_threshold: Option<f64>,
    },
    Update {
        positions: PositionInput,
    },
    GetTrack,
    GetState,
    ResetSession,
    EndSession,
    Health,

    SessionStarted {
        snapshot: Snapshot,
        track: TrackDescriptor,
    },
    State {
        snapshot: Snapshot,
    },
    Track {
        track: TrackDescriptor,
    },
    HealthStatus {
        status: String,
        message: String,
        active_sessions: usize,
    },
    SessionEnded,
    Error {
        kind: ErrorKind,
        message: String,
    },
}
