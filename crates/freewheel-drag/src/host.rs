//! The injected layout/render boundary.
//!
//! The binding never touches a real layout engine. Everything it needs to
//! know about elements arrives through [`LayoutHost`], and its only output
//! besides callbacks is `apply_translation`.

use freewheel_geometry::{Rect, Size, Vector2};

/// Opaque host-assigned element identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Scroll state of an ancestor that is able to scroll its content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollInfo {
    /// Current scroll position.
    pub offset: Vector2,
    /// Total size of the scrolled content.
    pub content_size: Size,
    /// Size of the scrolling box itself.
    pub viewport_size: Size,
}

/// One ancestor between the element and the container, nearest first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AncestorLayout {
    pub id: ElementId,
    /// Viewport rectangle when the ancestor establishes its own positioning
    /// context, `None` for statically positioned ancestors.
    pub positioned_rect: Option<Rect>,
    /// Present when the ancestor's overflow allows scrolling.
    pub scroll: Option<ScrollInfo>,
}

/// Host-side layout and transform services.
///
/// All rectangles are viewport coordinates. Measurements are expected to be
/// live; the binding does its own caching.
pub trait LayoutHost {
    /// Bounding rectangle of `element`.
    fn element_rect(&self, element: ElementId) -> Rect;

    /// Layout offset of `element` within its offset parent.
    fn layout_offset(&self, element: ElementId) -> Vector2;

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Ancestor chain from `element` up to, but excluding, `container`.
    fn ancestors(&self, element: ElementId, container: ElementId) -> Vec<AncestorLayout>;

    /// The default container when none is configured.
    fn root(&self) -> ElementId;

    /// Start delivering scroll notifications for `ancestor` to the binding.
    fn watch_scroll(&self, ancestor: ElementId);

    fn unwatch_scroll(&self, ancestor: ElementId);

    /// Writes the element's visual translation.
    fn apply_translation(&self, element: ElementId, x: f64, y: f64);

    /// Removes any translation previously applied to `element`.
    fn clear_translation(&self, element: ElementId);
}
