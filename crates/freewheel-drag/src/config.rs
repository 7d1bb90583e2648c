//! User configuration and the merged settings record.

use std::rc::Rc;

use freewheel_geometry::{Rect, Size, Vector2};

use crate::host::ElementId;

/// Where the movable region comes from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundsSource {
    /// The engine's reference container, with overflow-aware limits.
    Container,
    /// The element's direct parent, measured and cached.
    Parent,
    /// A designated element, measured and cached.
    Element(ElementId),
    /// A literal container-relative rectangle.
    Rect(Rect),
}

impl BoundsSource {
    /// The keyword table used by string-based configuration.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "container" => Some(Self::Container),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }
}

/// Pointer-down hit decision offered to the user.
#[derive(Clone, Copy, Debug)]
pub struct DownEvent {
    /// Result of the binding's own hit test.
    pub hit: bool,
    pub x: f64,
    pub y: f64,
    /// Container-relative element origin at the time of the event.
    pub element_x: f64,
    pub element_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Engine output offered to the user before translation.
#[derive(Clone, Copy, Debug)]
pub struct MoveEvent {
    pub x: f64,
    pub y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
}

/// Replacement position returned from an `on_move` hook; an absent axis
/// keeps the engine-reported value.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveOverride {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Final translation observation, fired after the transform write.
#[derive(Clone, Copy, Debug)]
pub struct TranslateEvent {
    pub x: f64,
    pub y: f64,
    pub size: Size,
    /// The active bounds rectangle: the resolved source rect, or the
    /// container rect when no source is configured.
    pub bounds: Rect,
}

/// Returning `Some` overrides the hit test; `None` defers to it.
pub type DownHook = Rc<dyn Fn(&DownEvent) -> Option<bool>>;
pub type MoveHook = Rc<dyn Fn(&MoveEvent) -> Option<MoveOverride>>;
pub type UpHook = Rc<dyn Fn()>;
pub type TranslateHook = Rc<dyn Fn(&TranslateEvent)>;

/// Loose user configuration; every field optional. Merged once into
/// [`Settings`] when the binding is constructed.
#[derive(Clone, Default)]
pub struct DragConfig {
    /// Element whose coordinate space pointer events are measured in;
    /// defaults to the host root.
    pub container: Option<ElementId>,
    pub bounds: Option<BoundsSource>,
    /// Anchor follows the exact grab point instead of a fixed fraction.
    pub auto_anchor: bool,
    /// Fixed anchor fraction in `[0, 1]`, used when `auto_anchor` is off.
    pub anchor_x: Option<f64>,
    pub anchor_y: Option<f64>,
    pub threshold: Option<f64>,
    pub restitution: Option<f64>,
    pub friction: Option<f64>,
    pub offset_friction: Option<f64>,
    pub max_velocity: Option<f64>,
    /// Re-run geometry synchronization on viewport resize.
    pub resize_update: bool,
    pub lock_x: bool,
    pub lock_y: bool,
    pub on_down: Option<DownHook>,
    pub on_move: Option<MoveHook>,
    pub on_up: Option<UpHook>,
    pub on_translate: Option<TranslateHook>,
}

/// Fully-populated settings record, immutable after the merge.
#[derive(Clone)]
pub(crate) struct Settings {
    pub bounds: Option<BoundsSource>,
    pub auto_anchor: bool,
    pub anchor: Vector2,
    pub threshold: Option<f64>,
    pub restitution: Option<f64>,
    pub friction: Option<f64>,
    pub offset_friction: Option<f64>,
    pub max_velocity: Option<f64>,
    pub resize_update: bool,
    pub lock_x: bool,
    pub lock_y: bool,
    pub on_down: Option<DownHook>,
    pub on_move: Option<MoveHook>,
    pub on_up: Option<UpHook>,
    pub on_translate: Option<TranslateHook>,
}

fn finite(value: Option<f64>, name: &str) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        Some(v) => {
            log::warn!("ignoring non-finite {name} setting: {v}");
            None
        }
        None => None,
    }
}

impl Settings {
    pub(crate) fn merge(config: &DragConfig) -> Self {
        let mut anchor = Vector2::new(
            finite(config.anchor_x, "anchor_x").unwrap_or(0.5),
            finite(config.anchor_y, "anchor_y").unwrap_or(0.5),
        );
        anchor.clamp(0.0, 1.0);

        Self {
            bounds: config.bounds,
            auto_anchor: config.auto_anchor,
            anchor,
            threshold: finite(config.threshold, "threshold"),
            restitution: finite(config.restitution, "restitution"),
            friction: finite(config.friction, "friction"),
            offset_friction: finite(config.offset_friction, "offset_friction"),
            max_velocity: finite(config.max_velocity, "max_velocity"),
            resize_update: config.resize_update,
            lock_x: config.lock_x,
            lock_y: config.lock_y,
            on_down: config.on_down.clone(),
            on_move: config.on_move.clone(),
            on_up: config.on_up.clone(),
            on_translate: config.on_translate.clone(),
        }
    }
}
