//! Draggable element binding for Freewheel
//!
//! [`Draggable`] owns one [`freewheel_motion::MotionEngine`] and maps its
//! abstract coordinate onto an element's visual translation: it derives the
//! movable region from host layout, keeps the configured anchor point under
//! the pointer, compensates for ancestor scroll, and forwards the result to
//! the injected [`LayoutHost`]. The host stays responsible for real event
//! wiring and for writing the transform.

mod config;
mod draggable;
mod host;
mod sink;

pub use config::{
    BoundsSource, DownEvent, DownHook, DragConfig, MoveEvent, MoveHook, MoveOverride,
    TranslateEvent, TranslateHook, UpHook,
};
pub use draggable::Draggable;
pub use host::{AncestorLayout, ElementId, LayoutHost, ScrollInfo};
pub use sink::{connect_sink, MotionSink};
