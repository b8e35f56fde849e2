//! Wire geometry: the polyline the player traces and the spherical zones at
//! either end of it.

use shared::{distance_to_polyline, Point3, BUZZ_WIRE_TRACK};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("a track needs at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("track point {0} contains a non-finite coordinate")]
    NonFinitePoint(usize),
}

/// Spherical start or end region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub center: Point3,
    pub radius: f64,
}

impl Zone {
    pub fn new(center: Point3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Strictly inside; a point exactly on the boundary does not count.
    pub fn contains(&self, point: &Point3) -> bool {
        point.distance(&self.center) < self.radius
    }
}

/// Ordered, immutable sequence of at least two points
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<Point3>,
}

impl Track {
    pub fn new(points: Vec<Point3>) -> Result<Self, TrackError> {
        if points.len() < 2 {
            return Err(TrackError::TooFewPoints(points.len()));
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(TrackError::NonFinitePoint(index));
        }
        Ok(Self { points })
    }

    /// The fixed buzz-wire course every session plays on.
    pub fn buzz_wire() -> Self {
        Self {
            points: BUZZ_WIRE_TRACK.iter().copied().map(Point3::from).collect(),
        }
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn start(&self) -> Point3 {
        self.points[0]
    }

    pub fn end(&self) -> Point3 {
        self.points[self.points.len() - 1]
    }

    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Minimum distance from `point` to any segment of the track.
    pub fn distance_to(&self, point: &Point3) -> f64 {
        distance_to_polyline(point, &self.points)
    }
}
