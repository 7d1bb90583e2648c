//! Timestamped position sample used for release-velocity estimation.

use freewheel_geometry::Vector2;

/// A position captured on a sampling tick.
///
/// The position is an owned copy; later engine movement never rewrites an
/// already-recorded sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingSample {
    pub position: Vector2,
    pub timestamp_ms: u64,
}

impl TrackingSample {
    pub fn new(position: Vector2, timestamp_ms: u64) -> Self {
        Self {
            position,
            timestamp_ms,
        }
    }
}
