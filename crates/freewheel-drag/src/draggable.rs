//! The draggable element binding.
//!
//! Owns one [`MotionEngine`] and translates its coordinate space onto the
//! element's visual offset. The engine works in container-local
//! coordinates; this module converts viewport pointer events on the way in
//! and element-relative translations on the way out.

use std::cell::RefCell;
use std::rc::Rc;

use freewheel_core::TickClock;
use freewheel_geometry::{Rect, Vector2};
use freewheel_motion::MotionEngine;
use smallvec::SmallVec;

use crate::config::{BoundsSource, DownEvent, DragConfig, MoveEvent, Settings, TranslateEvent};
use crate::host::{AncestorLayout, ElementId, LayoutHost};

struct DraggableState {
    element: ElementId,
    container: ElementId,
    host: Rc<dyn LayoutHost>,
    clock: TickClock,
    config: DragConfig,
    settings: Settings,
    engine: Option<MotionEngine>,
    element_rect: Rect,
    container_rect: Rect,
    anchor_point: Vector2,
    position_offset: Vector2,
    start_position: Vector2,
    scroll_offset: Vector2,
    watched_scroll: SmallVec<[ElementId; 4]>,
    resolved_bounds: Option<Rect>,
    last_translation: Vector2,
    last_engine_position: Vector2,
    destroyed: bool,
}

/// Binds one element to one motion engine.
///
/// All methods are synchronous and re-entrancy safe: user hooks always run
/// with no internal borrow held, so a hook may call back into the binding.
pub struct Draggable {
    state: Rc<RefCell<DraggableState>>,
}

impl Draggable {
    pub fn new(
        element: ElementId,
        host: Rc<dyn LayoutHost>,
        clock: TickClock,
        config: DragConfig,
    ) -> Self {
        let container = config.container.unwrap_or_else(|| host.root());
        let settings = Settings::merge(&config);
        let element_rect = host.element_rect(element);
        let container_rect = host.element_rect(container);

        let draggable = Self {
            state: Rc::new(RefCell::new(DraggableState {
                element,
                container,
                host,
                clock,
                config,
                settings,
                engine: None,
                element_rect,
                container_rect,
                anchor_point: Vector2::new(0.5, 0.5),
                position_offset: Vector2::ZERO,
                start_position: Vector2::ZERO,
                scroll_offset: Vector2::ZERO,
                watched_scroll: SmallVec::new(),
                resolved_bounds: None,
                last_translation: Vector2::ZERO,
                last_engine_position: Vector2::ZERO,
                destroyed: false,
            })),
        };
        draggable.init();
        draggable
    }

    fn init(&self) {
        let engine = {
            let mut s = self.state.borrow_mut();
            let engine = MotionEngine::new(s.clock.clone());
            s.engine = Some(engine.clone());
            engine
        };

        // The engine must not keep the binding alive: every callback
        // captures a weak handle.
        let weak = Rc::downgrade(&self.state);
        engine.on_down(move |x, y| match weak.upgrade() {
            Some(state) => handle_down(&state, x, y),
            None => false,
        });

        let weak = Rc::downgrade(&self.state);
        engine.on_move(move |x, y, velocity_x, velocity_y| {
            if let Some(state) = weak.upgrade() {
                handle_move(&state, x, y, velocity_x, velocity_y);
            }
        });

        let weak = Rc::downgrade(&self.state);
        engine.on_up(move || {
            if let Some(state) = weak.upgrade() {
                handle_up(&state);
            }
        });

        self.update_settings();
        self.set_initial_position();
        self.update(false);
    }

    /// A clone of the owned engine handle, for direct inspection or tuning.
    pub fn engine(&self) -> Option<MotionEngine> {
        self.state.borrow().engine.clone()
    }

    pub fn config(&self) -> DragConfig {
        self.state.borrow().config.clone()
    }

    pub fn position_offset(&self) -> Vector2 {
        self.state.borrow().position_offset
    }

    pub fn scroll_offset(&self) -> Vector2 {
        self.state.borrow().scroll_offset
    }

    /// Pushes the merged numeric settings into the engine. Absent or
    /// non-finite values leave the engine defaults untouched.
    pub fn update_settings(&self) {
        let (engine, settings) = {
            let s = self.state.borrow();
            match &s.engine {
                Some(engine) => (engine.clone(), s.settings.clone()),
                None => return,
            }
        };

        if let Some(restitution) = settings.restitution {
            engine.set_restitution(restitution);
        }
        if let Some(friction) = settings.friction {
            engine.set_friction(friction);
        }
        if let Some(offset_friction) = settings.offset_friction {
            engine.set_offset_friction(offset_friction);
        }
        if let Some(threshold) = settings.threshold {
            engine.set_threshold(threshold);
        }
        if let Some(max_velocity) = settings.max_velocity {
            engine.set_max_velocity(max_velocity);
        }
    }

    /// Replaces the configuration, re-merges it and re-pushes the numeric
    /// settings. Hooks and locks take effect immediately; geometry-affecting
    /// fields apply on the next [`update`](Self::update).
    pub fn set_config(&self, config: DragConfig) {
        {
            let mut s = self.state.borrow_mut();
            s.settings = Settings::merge(&config);
            s.config = config;
        }
        self.update_settings();
    }

    /// Re-synchronizes against host layout: element rect, anchor offset,
    /// ancestor offsets, scroll watch set and bounds. With
    /// `skip_engine_sync` the engine is left un-notified.
    pub fn update(&self, skip_engine_sync: bool) {
        let engine = {
            let mut s = self.state.borrow_mut();
            if s.destroyed {
                return;
            }

            s.element_rect = s.host.element_rect(s.element);

            if !s.settings.auto_anchor {
                s.anchor_point = s.settings.anchor;
                s.position_offset = Vector2::new(
                    s.element_rect.width * s.anchor_point.x,
                    s.element_rect.height * s.anchor_point.y,
                );
            }

            s.start_position = s.host.layout_offset(s.element);

            let ancestors = s.host.ancestors(s.element, s.container);

            // Positioned ancestors contribute the largest offset seen so
            // far on each axis independently, not a sum.
            let mut container_offset = Vector2::ZERO;
            let mut scrollables: SmallVec<[ElementId; 4]> = SmallVec::new();
            for ancestor in &ancestors {
                if let Some(rect) = ancestor.positioned_rect {
                    if rect.x > container_offset.x {
                        container_offset.x = rect.x;
                    }
                    if rect.y > container_offset.y {
                        container_offset.y = rect.y;
                    }
                }
                if ancestor.scroll.is_some() {
                    scrollables.push(ancestor.id);
                }
            }
            s.start_position.x += container_offset.x;
            s.start_position.y += container_offset.y;

            s.scroll_offset = aggregate_scroll(&ancestors);

            // Re-listen only on the changes.
            for id in &scrollables {
                if !s.watched_scroll.contains(id) {
                    s.host.watch_scroll(*id);
                }
            }
            for id in &s.watched_scroll {
                if !scrollables.contains(id) {
                    s.host.unwatch_scroll(*id);
                }
            }
            s.watched_scroll = scrollables;

            update_bounds_inner(&mut s, true);

            if skip_engine_sync {
                None
            } else {
                s.container_rect = s.host.element_rect(s.container);
                s.engine.clone()
            }
        };

        if let Some(engine) = engine {
            engine.update();
        }
    }

    /// Re-derives the engine bounds from the configured source. With
    /// `force_remeasure` a cached element-based source is measured again.
    pub fn update_bounds(&self, force_remeasure: bool) {
        let mut s = self.state.borrow_mut();
        if s.destroyed {
            return;
        }
        update_bounds_inner(&mut s, force_remeasure);
    }

    /// Viewport-space pointer-down entry point.
    pub fn pointer_down(&self, x: f64, y: f64, now_ms: u64) {
        if let Some((engine, local)) = self.to_engine_space(x, y) {
            engine.pointer_down(local.x, local.y, now_ms);
        }
    }

    /// Viewport-space pointer-move entry point.
    pub fn pointer_move(&self, x: f64, y: f64) {
        if let Some((engine, local)) = self.to_engine_space(x, y) {
            engine.pointer_move(local.x, local.y);
        }
    }

    pub fn pointer_up(&self, now_ms: u64) {
        let engine = {
            let s = self.state.borrow();
            if s.destroyed {
                return;
            }
            s.engine.clone()
        };
        if let Some(engine) = engine {
            engine.pointer_up(now_ms);
        }
    }

    /// Host notification that the viewport resized.
    pub fn handle_resize(&self) {
        let wanted = {
            let s = self.state.borrow();
            !s.destroyed && s.settings.resize_update
        };
        if wanted {
            self.set_initial_position();
            self.update(false);
        }
    }

    /// Host notification that a watched ancestor scrolled. Recomputes the
    /// aggregate scroll offset and re-applies the current translation.
    pub fn handle_ancestor_scroll(&self) {
        let position = {
            let mut s = self.state.borrow_mut();
            if s.destroyed {
                return;
            }
            let ancestors = s.host.ancestors(s.element, s.container);
            s.scroll_offset = aggregate_scroll(&ancestors);
            s.last_engine_position
        };
        translate(&self.state, position.x, position.y);
    }

    /// Tears down the owned engine and clears the element transform.
    pub fn destroy(&self) {
        let (engine, host, element, watched) = {
            let mut s = self.state.borrow_mut();
            s.destroyed = true;
            (
                s.engine.take(),
                Rc::clone(&s.host),
                s.element,
                std::mem::take(&mut s.watched_scroll),
            )
        };

        if let Some(engine) = engine {
            engine.destroy();
        }
        for id in watched {
            host.unwatch_scroll(id);
        }
        host.clear_translation(element);
    }

    /// Brings a destroyed binding back with a fresh engine.
    pub fn restore(&self) {
        self.state.borrow_mut().destroyed = false;
        self.init();
    }

    /// Full re-seed: destroy followed by restore.
    pub fn reset(&self) {
        self.destroy();
        self.restore();
    }

    fn set_initial_position(&self) {
        let mut s = self.state.borrow_mut();
        if s.destroyed {
            return;
        }
        let initial = relative_element_position(&s);
        let position = Vector2::new(
            initial.x + s.position_offset.x,
            initial.y + s.position_offset.y,
        );
        s.last_engine_position = position;
        if let Some(engine) = &s.engine {
            engine.set_position(position.x, position.y, true);
        }
    }

    fn to_engine_space(&self, x: f64, y: f64) -> Option<(MotionEngine, Vector2)> {
        let s = self.state.borrow();
        if s.destroyed {
            return None;
        }
        let engine = s.engine.clone()?;
        let local = Vector2::new(x - s.container_rect.x, y - s.container_rect.y);
        Some((engine, local))
    }
}

/// Container-relative element origin, measured fresh.
fn relative_element_position(s: &DraggableState) -> Vector2 {
    let rect = s.host.element_rect(s.element);
    Vector2::new(rect.x - s.container_rect.x, rect.y - s.container_rect.y)
}

/// Scroll offsets aggregate only from scrollable ancestors whose content
/// actually exceeds their own box.
fn aggregate_scroll(ancestors: &[AncestorLayout]) -> Vector2 {
    let mut total = Vector2::ZERO;
    for ancestor in ancestors {
        if let Some(scroll) = &ancestor.scroll {
            if scroll.content_size.width > scroll.viewport_size.width
                || scroll.content_size.height > scroll.viewport_size.height
            {
                total.x += scroll.offset.x;
                total.y += scroll.offset.y;
            }
        }
    }
    total
}

/// Pushes the movable region for a resolved source rect: the region is the
/// rect shifted so the anchor point, not the top-left corner, stays inside.
fn set_anchored_region(s: &DraggableState, engine: &MotionEngine, rect: Rect) {
    engine.set_bounds(
        rect.x + s.position_offset.x,
        rect.x + rect.width - (s.element_rect.width - s.position_offset.x),
        rect.y + s.position_offset.y,
        rect.y + rect.height - (s.element_rect.height - s.position_offset.y),
    );
}

fn update_bounds_inner(s: &mut DraggableState, force_remeasure: bool) {
    let source = match s.settings.bounds {
        Some(source) => source,
        None => return,
    };
    let engine = match &s.engine {
        Some(engine) => engine.clone(),
        None => return,
    };

    match source {
        BoundsSource::Rect(rect) => {
            s.resolved_bounds = Some(rect);
            set_anchored_region(s, &engine, rect);
        }
        BoundsSource::Element(element) => {
            if force_remeasure || s.resolved_bounds.is_none() {
                s.resolved_bounds = Some(relative_rect(s, element));
            }
            if let Some(rect) = s.resolved_bounds {
                set_anchored_region(s, &engine, rect);
            }
        }
        BoundsSource::Parent => match s.host.parent(s.element) {
            Some(parent) => {
                if force_remeasure || s.resolved_bounds.is_none() {
                    s.resolved_bounds = Some(relative_rect(s, parent));
                }
                if let Some(rect) = s.resolved_bounds {
                    set_anchored_region(s, &engine, rect);
                }
            }
            None => log::warn!("parent bounds requested for an element with no parent"),
        },
        BoundsSource::Container => {
            if force_remeasure {
                s.container_rect = s.host.element_rect(s.container);
            }
            let container = s.container_rect;
            // An element larger than its container swaps the roles of the
            // two limits so the overhang can be dragged into view.
            let overflow_x = s.element_rect.width > container.width;
            let overflow_y = s.element_rect.height > container.height;
            engine.set_bounds(
                if overflow_x {
                    s.position_offset.x + container.width - s.element_rect.width
                } else {
                    s.position_offset.x
                },
                if overflow_x {
                    s.position_offset.x
                } else {
                    container.width - (s.element_rect.width - s.position_offset.x)
                },
                if overflow_y {
                    s.position_offset.y + container.height - s.element_rect.height
                } else {
                    s.position_offset.y
                },
                if overflow_y {
                    s.position_offset.y
                } else {
                    container.height - (s.element_rect.height - s.position_offset.y)
                },
            );
        }
    }
}

/// Container-relative rectangle of `element`, measured fresh.
fn relative_rect(s: &DraggableState, element: ElementId) -> Rect {
    let rect = s.host.element_rect(element);
    Rect::new(
        rect.x - s.container_rect.x,
        rect.y - s.container_rect.y,
        rect.width,
        rect.height,
    )
}

/// Engine down predicate: hit-test the pointer against the element, feed
/// the auto anchor, and let the user hook have the final word.
fn handle_down(state: &Rc<RefCell<DraggableState>>, x: f64, y: f64) -> bool {
    let (hit, hook, event) = {
        let mut s = state.borrow_mut();
        if s.destroyed {
            return false;
        }

        let element_position = relative_element_position(&s);
        let hit = Rect::new(
            element_position.x,
            element_position.y,
            s.element_rect.width,
            s.element_rect.height,
        )
        .contains(x, y);

        if s.settings.auto_anchor && hit {
            // Keep the object under the grab point instead of snapping its
            // anchor there.
            s.position_offset =
                Vector2::new(x - element_position.x, y - element_position.y);
            update_bounds_inner(&mut s, false);
        }

        let event = DownEvent {
            hit,
            x,
            y,
            element_x: element_position.x,
            element_y: element_position.y,
            width: s.element_rect.width,
            height: s.element_rect.height,
        };
        (hit, s.settings.on_down.clone(), event)
    };

    if let Some(hook) = hook {
        if let Some(overridden) = hook(&event) {
            return overridden;
        }
    }
    hit
}

/// Engine move listener: user override, then translation.
fn handle_move(state: &Rc<RefCell<DraggableState>>, x: f64, y: f64, vx: f64, vy: f64) {
    let hook = {
        let s = state.borrow();
        if s.destroyed {
            return;
        }
        s.settings.on_move.clone()
    };

    let mut position = Vector2::new(x, y);
    if let Some(hook) = hook {
        if let Some(replacement) = hook(&MoveEvent {
            x,
            y,
            velocity_x: vx,
            velocity_y: vy,
        }) {
            if let Some(ox) = replacement.x {
                position.x = ox;
            }
            if let Some(oy) = replacement.y {
                position.y = oy;
            }
        }
    }

    {
        let mut s = state.borrow_mut();
        if s.destroyed {
            return;
        }
        s.last_engine_position = position;
    }
    translate(state, position.x, position.y);
}

fn handle_up(state: &Rc<RefCell<DraggableState>>) {
    let hook = {
        let s = state.borrow();
        if s.destroyed {
            return;
        }
        s.settings.on_up.clone()
    };
    if let Some(hook) = hook {
        hook();
    }
}

/// Maps an engine position to the element-local translation and writes it.
fn translate(state: &Rc<RefCell<DraggableState>>, x: f64, y: f64) {
    let (host, element, event, hook) = {
        let mut s = state.borrow_mut();
        if s.destroyed {
            return;
        }

        let mut translation = Vector2::new(
            x - s.position_offset.x - s.start_position.x + s.scroll_offset.x,
            y - s.position_offset.y - s.start_position.y + s.scroll_offset.y,
        );
        if s.settings.lock_x {
            translation.x = s.last_translation.x;
        }
        if s.settings.lock_y {
            translation.y = s.last_translation.y;
        }
        s.last_translation = translation;

        let bounds = s.resolved_bounds.unwrap_or(s.container_rect);
        let event = TranslateEvent {
            x: translation.x,
            y: translation.y,
            size: s.element_rect.size(),
            bounds,
        };
        (
            Rc::clone(&s.host),
            s.element,
            event,
            s.settings.on_translate.clone(),
        )
    };

    host.apply_translation(element, event.x, event.y);
    if let Some(hook) = hook {
        hook(&event);
    }
}
