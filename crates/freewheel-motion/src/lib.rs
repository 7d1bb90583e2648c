//! Inertial motion tracking for Freewheel
//!
//! [`MotionEngine`] turns a stream of pointer positions into a coordinate
//! that keeps moving after release, decays under friction, and interacts
//! with a bounding region through either a rigid bounce or an elastic
//! overflow recovery. It is driven entirely by host-supplied event times
//! and tick callbacks, so a test can replay any gesture deterministically.

mod engine;
mod sample;

pub use engine::{
    MotionEngine, DEFAULT_FRICTION, DEFAULT_MAX_VELOCITY, DEFAULT_OFFSET_FRICTION,
    DEFAULT_PRECISION, DEFAULT_RETENTION_MS, DEFAULT_THRESHOLD,
};
pub use sample::TrackingSample;
