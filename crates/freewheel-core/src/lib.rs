//! Tick-driven runtime plumbing for Freewheel
//!
//! The motion engine never reads a wall clock and never owns a timer. It
//! registers one-shot tick callbacks against a [`Runtime`] and the host
//! drains them once per animation frame with the frame timestamp. Tests
//! drain the queue manually with synthetic times.

pub mod platform;
pub mod runtime;
pub mod tick_clock;

pub use platform::{DefaultScheduler, TickScheduler};
pub use runtime::{Runtime, RuntimeHandle, TickCallbackId};
pub use tick_clock::{TickClock, TickRegistration};
