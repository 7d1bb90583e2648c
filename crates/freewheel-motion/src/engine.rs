//! The pointer-tracking and deceleration state machine.
//!
//! One engine instance tracks one coordinate. While a drag is active it
//! records a rolling window of [`TrackingSample`]s; on release it estimates
//! a velocity from that window and, if fast enough, hands the coordinate to
//! a self-re-arming deceleration loop on the tick clock.

use std::cell::RefCell;
use std::rc::Rc;

use freewheel_core::{TickClock, TickRegistration};
use freewheel_geometry::{Bounds, Vector2};
use smallvec::SmallVec;

use crate::sample::TrackingSample;

/// Default per-tick velocity decay coefficient.
pub const DEFAULT_FRICTION: f64 = 0.035;
/// Default decay coefficient while overflow recovery is active.
pub const DEFAULT_OFFSET_FRICTION: f64 = 0.1;
/// Default minimum release speed that starts deceleration.
pub const DEFAULT_THRESHOLD: f64 = 5.0;
/// Default symmetric velocity clamp.
pub const DEFAULT_MAX_VELOCITY: f64 = 70.0;
/// Default retention window for velocity samples, in milliseconds.
pub const DEFAULT_RETENTION_MS: u64 = 50;
/// Default number of decimal digits kept by the integration steps.
pub const DEFAULT_PRECISION: u32 = 3;

/// Milliseconds per internal velocity unit. A release velocity of 1.0 means
/// one pixel per 15 ms of drag movement.
const VELOCITY_UNIT_MS: f64 = 15.0;

type DownPredicate = Rc<dyn Fn(f64, f64) -> bool>;
type MoveListener = Rc<dyn Fn(f64, f64, f64, f64)>;
type UpListener = Rc<dyn Fn()>;

struct EngineState {
    position: Vector2,
    last_position: Vector2,
    velocity: Vector2,
    start_position: Vector2,
    start_time_ms: u64,
    samples: Vec<TrackingSample>,
    bounds: Bounds,
    has_bounds: bool,
    has_bounds_x: bool,
    has_bounds_y: bool,
    bound_overflow: Vector2,
    friction: Vector2,
    offset_friction: Vector2,
    active_offset_friction: Vector2,
    restitution: Vector2,
    threshold: f64,
    max_velocity: f64,
    retention_ms: u64,
    precision: u32,
    dragging: bool,
    allow_decelerating: bool,
    decelerating: bool,
    animations_stopped: bool,
    down_predicate: Option<DownPredicate>,
    move_listeners: SmallVec<[MoveListener; 2]>,
    up_listeners: SmallVec<[UpListener; 2]>,
    sample_registration: Option<TickRegistration>,
    decay_registration: Option<TickRegistration>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            position: Vector2::ZERO,
            last_position: Vector2::ZERO,
            velocity: Vector2::ZERO,
            start_position: Vector2::ZERO,
            start_time_ms: 0,
            samples: Vec::new(),
            bounds: Bounds::ZERO,
            has_bounds: false,
            has_bounds_x: false,
            has_bounds_y: false,
            bound_overflow: Vector2::ZERO,
            friction: Vector2::new(DEFAULT_FRICTION, DEFAULT_FRICTION),
            offset_friction: Vector2::new(DEFAULT_OFFSET_FRICTION, DEFAULT_OFFSET_FRICTION),
            active_offset_friction: Vector2::ZERO,
            restitution: Vector2::ZERO,
            threshold: DEFAULT_THRESHOLD,
            max_velocity: DEFAULT_MAX_VELOCITY,
            retention_ms: DEFAULT_RETENTION_MS,
            precision: DEFAULT_PRECISION,
            dragging: false,
            allow_decelerating: false,
            decelerating: false,
            animations_stopped: false,
            down_predicate: None,
            move_listeners: SmallVec::new(),
            up_listeners: SmallVec::new(),
            sample_registration: None,
            decay_registration: None,
        }
    }

    fn apply_bounds(&mut self) {
        if !self.has_bounds {
            return;
        }

        if self.has_bounds_x {
            if self.restitution.x >= 0.0 {
                self.position.clamp_x(self.bounds.min_x, self.bounds.max_x);

                // Bounce: at a limit the velocity inverts, scaled by the
                // restitution coefficient.
                if self.position.x <= self.bounds.min_x || self.position.x >= self.bounds.max_x {
                    self.velocity.x = -self.velocity.x * self.restitution.x;
                }
            } else {
                if self.bound_overflow.x != 0.0 {
                    self.active_offset_friction.x = self.offset_friction.x;
                    self.recover_overflow_x();
                } else {
                    self.active_offset_friction.x = 0.0;
                }

                let min_diff = self.bounds.min_x - self.position.x;
                let max_diff = self.bounds.max_x - self.position.x;
                self.bound_overflow.x = if min_diff > 0.0 {
                    min_diff
                } else if max_diff < 0.0 {
                    max_diff
                } else {
                    0.0
                };
            }
        }

        if self.has_bounds_y {
            if self.restitution.y >= 0.0 {
                self.position.clamp_y(self.bounds.min_y, self.bounds.max_y);

                if self.position.y <= self.bounds.min_y || self.position.y >= self.bounds.max_y {
                    self.velocity.y = -self.velocity.y * self.restitution.y;
                }
            } else {
                if self.bound_overflow.y != 0.0 {
                    self.active_offset_friction.y = self.offset_friction.y;
                    self.recover_overflow_y();
                } else {
                    self.active_offset_friction.y = 0.0;
                }

                let min_diff = self.bounds.min_y - self.position.y;
                let max_diff = self.bounds.max_y - self.position.y;
                self.bound_overflow.y = if min_diff > 0.0 {
                    min_diff
                } else if max_diff < 0.0 {
                    max_diff
                } else {
                    0.0
                };
            }
        }
    }

    fn recover_overflow_x(&mut self) {
        if self.bound_overflow.x == 0.0 {
            return;
        }
        let mut restitution = self.restitution.x;
        if self.dragging {
            restitution /= 2.0;
        }
        self.position.x +=
            truncate_digits(self.bound_overflow.x * (1.0 + restitution), self.precision);
    }

    fn recover_overflow_y(&mut self) {
        if self.bound_overflow.y == 0.0 {
            return;
        }
        // Recovery strength tracks the x coefficient on both axes; the
        // scalar setter keeps the two equal.
        let mut restitution = self.restitution.x;
        if self.dragging {
            restitution /= 2.0;
        }
        self.position.y +=
            truncate_digits(self.bound_overflow.y * (1.0 + restitution), self.precision);
    }
}

/// Truncates toward zero at `digits` decimal places.
fn truncate_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).trunc() / factor
}

/// Rounds half away from zero at `digits` decimal places.
fn round_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Applies bounds, then notifies move listeners iff the position changed
/// since the last notification. Listeners run with no engine borrow held,
/// so they may call back into the engine.
fn position_updated(state: &Rc<RefCell<EngineState>>) {
    let notify = {
        let mut s = state.borrow_mut();
        s.apply_bounds();
        if s.position != s.last_position {
            s.last_position = s.position;
            Some((s.position, s.velocity, s.move_listeners.clone()))
        } else {
            None
        }
    };

    if let Some((position, velocity, listeners)) = notify {
        for listener in listeners.iter() {
            listener(position.x, position.y, velocity.x, velocity.y);
        }
    }
}

fn schedule_sampling(state: &Rc<RefCell<EngineState>>, clock: &TickClock) {
    if state.borrow().animations_stopped {
        return;
    }
    let state_for_tick = Rc::clone(state);
    let clock_for_tick = clock.clone();
    let registration = clock.with_tick_millis(move |now_ms| {
        collect_samples(&state_for_tick, &clock_for_tick, now_ms);
    });
    state.borrow_mut().sample_registration = Some(registration);
}

/// One sampling step: record the current position, evict samples that fell
/// out of the retention window, and re-anchor the velocity estimation to the
/// oldest remaining sample.
fn collect_samples(state: &Rc<RefCell<EngineState>>, clock: &TickClock, now_ms: u64) {
    let dragging = {
        let mut s = state.borrow_mut();
        let position = s.position;
        s.samples.push(TrackingSample::new(position, now_ms));

        let retention_ms = s.retention_ms;
        s.samples
            .retain(|sample| now_ms.saturating_sub(sample.timestamp_ms) < retention_ms);

        if let Some(oldest) = s.samples.first().copied() {
            s.start_position = oldest.position;
            s.start_time_ms = oldest.timestamp_ms;
        }
        s.dragging
    };

    if dragging {
        schedule_sampling(state, clock);
    }
}

fn schedule_deceleration(state: &Rc<RefCell<EngineState>>, clock: &TickClock) {
    if state.borrow().animations_stopped {
        return;
    }
    let state_for_tick = Rc::clone(state);
    let clock_for_tick = clock.clone();
    let registration = clock.with_tick_millis(move |_now_ms| {
        decelerate(&state_for_tick, &clock_for_tick);
    });
    state.borrow_mut().decay_registration = Some(registration);
}

/// One deceleration step: decay each axis by its active coefficient,
/// integrate, re-apply bounds through the notification path, and re-arm
/// while any motion or overflow remains.
fn decelerate(state: &Rc<RefCell<EngineState>>, clock: &TickClock) {
    {
        let mut s = state.borrow_mut();
        if !s.allow_decelerating {
            return;
        }
        s.decelerating = true;

        if s.velocity.x.abs() > 0.0 {
            let coefficient = if s.active_offset_friction.x > 0.0 {
                s.active_offset_friction.x
            } else {
                s.friction.x
            };
            let precision = s.precision;
            s.velocity.x = truncate_digits(s.velocity.x * (1.0 - coefficient), precision);
            s.position.x += s.velocity.x;
            s.position.x = round_digits(s.position.x, precision);
        }

        if s.velocity.y.abs() > 0.0 {
            let coefficient = if s.active_offset_friction.y > 0.0 {
                s.active_offset_friction.y
            } else {
                s.friction.y
            };
            let precision = s.precision;
            s.velocity.y = truncate_digits(s.velocity.y * (1.0 - coefficient), precision);
            s.position.y += s.velocity.y;
            s.position.y = round_digits(s.position.y, precision);
        }

        // Velocity may have changed during deceleration; re-clamp.
        let max_velocity = s.max_velocity;
        s.velocity.clamp(-max_velocity, max_velocity);
    }

    position_updated(state);

    let keep_going = {
        let s = state.borrow();
        s.velocity.x.abs() > 0.0
            || s.velocity.y.abs() > 0.0
            || s.bound_overflow.x != 0.0
            || s.bound_overflow.y != 0.0
    };

    if keep_going {
        schedule_deceleration(state, clock);
    } else {
        state.borrow_mut().decelerating = false;
    }
}

/// Tracks one coordinate through drag and release.
///
/// Cloning yields a second handle to the same engine, in the manner of the
/// tick registrations it hands out: all state lives behind the shared cell.
pub struct MotionEngine {
    state: Rc<RefCell<EngineState>>,
    clock: TickClock,
}

impl Clone for MotionEngine {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            clock: self.clock.clone(),
        }
    }
}

impl MotionEngine {
    pub fn new(clock: TickClock) -> Self {
        Self {
            state: Rc::new(RefCell::new(EngineState::new())),
            clock,
        }
    }

    /// Installs the down predicate. Called with the event-local coordinates
    /// on pointer-down; returning false rejects the drag outright.
    pub fn on_down(&self, predicate: impl Fn(f64, f64) -> bool + 'static) {
        self.state.borrow_mut().down_predicate = Some(Rc::new(predicate));
    }

    /// Adds a move listener, invoked with `(x, y, vx, vy)` whenever the
    /// notified position changes. Listeners run in registration order.
    pub fn on_move(&self, listener: impl Fn(f64, f64, f64, f64) + 'static) {
        self.state.borrow_mut().move_listeners.push(Rc::new(listener));
    }

    /// Adds an up listener, invoked after every release.
    pub fn on_up(&self, listener: impl Fn() + 'static) {
        self.state.borrow_mut().up_listeners.push(Rc::new(listener));
    }

    pub fn set_friction(&self, friction: f64) {
        let mut s = self.state.borrow_mut();
        s.friction = Vector2::new(friction, friction);
        s.friction.clamp(0.0, 1.0);
    }

    pub fn set_offset_friction(&self, friction: f64) {
        let mut s = self.state.borrow_mut();
        s.offset_friction = Vector2::new(friction, friction);
        s.offset_friction.clamp(0.0, 1.0);
    }

    pub fn set_restitution(&self, restitution: f64) {
        let mut s = self.state.borrow_mut();
        s.restitution = Vector2::new(restitution, restitution);
        s.restitution.clamp(-1.0, 1.0);
    }

    pub fn set_threshold(&self, threshold: f64) {
        self.state.borrow_mut().threshold = threshold;
    }

    pub fn set_max_velocity(&self, max_velocity: f64) {
        self.state.borrow_mut().max_velocity = max_velocity.max(0.0);
    }

    /// Sets the movable region. An axis whose min/max pair is both zero is
    /// treated as unbounded.
    pub fn set_bounds(&self, min_x: f64, max_x: f64, min_y: f64, max_y: f64) {
        let mut s = self.state.borrow_mut();
        s.bounds = Bounds::new(min_x, max_x, min_y, max_y);
        s.has_bounds_x = s.bounds.min_x != 0.0 || s.bounds.max_x != 0.0;
        s.has_bounds_y = s.bounds.min_y != 0.0 || s.bounds.max_y != 0.0;
        s.has_bounds = s.has_bounds_x || s.has_bounds_y;
    }

    /// Moves the coordinate directly. With `reset`, the notification dedup
    /// baseline follows along and an in-flight deceleration loses its
    /// velocity.
    pub fn set_position(&self, x: f64, y: f64, reset: bool) {
        let mut s = self.state.borrow_mut();
        s.position = Vector2::new(x, y);
        if reset {
            s.last_position = s.position;
            if s.decelerating {
                s.velocity = Vector2::ZERO;
            }
        }
    }

    pub fn position(&self) -> Vector2 {
        self.state.borrow().position
    }

    pub fn velocity(&self) -> Vector2 {
        self.state.borrow().velocity
    }

    pub fn bound_overflow(&self) -> Vector2 {
        self.state.borrow().bound_overflow
    }

    pub fn bounds(&self) -> Bounds {
        self.state.borrow().bounds
    }

    pub fn has_bounds(&self) -> bool {
        self.state.borrow().has_bounds
    }

    pub fn friction(&self) -> Vector2 {
        self.state.borrow().friction
    }

    pub fn restitution(&self) -> Vector2 {
        self.state.borrow().restitution
    }

    pub fn threshold(&self) -> f64 {
        self.state.borrow().threshold
    }

    pub fn max_velocity(&self) -> f64 {
        self.state.borrow().max_velocity
    }

    pub fn is_dragging(&self) -> bool {
        self.state.borrow().dragging
    }

    pub fn is_decelerating(&self) -> bool {
        self.state.borrow().decelerating
    }

    /// Pauses all animation: pending ticks still fire but neither loop
    /// re-arms, and releases no longer start deceleration.
    pub fn stop(&self) {
        let mut s = self.state.borrow_mut();
        s.animations_stopped = true;
        s.allow_decelerating = false;
    }

    /// Re-enables animation after [`stop`](Self::stop).
    pub fn start(&self) {
        let mut s = self.state.borrow_mut();
        s.animations_stopped = false;
        s.allow_decelerating = true;
    }

    /// Unregisters every callback, cancels pending ticks and stops.
    pub fn destroy(&self) {
        {
            let mut s = self.state.borrow_mut();
            s.down_predicate = None;
            s.move_listeners.clear();
            s.up_listeners.clear();
            s.sample_registration = None;
            s.decay_registration = None;
        }
        self.stop();
    }

    /// Re-runs the bounds-then-notify path without moving the coordinate.
    pub fn update(&self) {
        position_updated(&self.state);
    }

    /// Begins a drag at the event position, unless the down predicate
    /// rejects it. The predicate runs before any state changes and may call
    /// back into the engine.
    pub fn pointer_down(&self, x: f64, y: f64, now_ms: u64) {
        let predicate = self.state.borrow().down_predicate.clone();
        if let Some(predicate) = predicate {
            if !predicate(x, y) {
                return;
            }
        }

        {
            let mut s = self.state.borrow_mut();
            s.dragging = true;
            s.allow_decelerating = false;
            s.start_position = Vector2::new(x, y);
            s.position = s.start_position;
            s.start_time_ms = now_ms;
            s.velocity = Vector2::ZERO;
        }

        position_updated(&self.state);
        collect_samples(&self.state, &self.clock, now_ms);
    }

    /// Moves the tracked coordinate while dragging; ignored otherwise.
    pub fn pointer_move(&self, x: f64, y: f64) {
        {
            let mut s = self.state.borrow_mut();
            if !s.dragging {
                return;
            }
            s.position = Vector2::new(x, y);
        }
        position_updated(&self.state);
    }

    /// Ends the drag: estimates the release velocity over the sample window,
    /// starts deceleration when it beats the threshold (or an overflow is
    /// pending), then fires the up listeners.
    pub fn pointer_up(&self, now_ms: u64) {
        let (start_deceleration, up_listeners) = {
            let mut s = self.state.borrow_mut();
            if !s.dragging {
                return;
            }
            s.dragging = false;
            s.allow_decelerating = true;

            // Velocity over the re-anchored window, in pixels per 15 ms. An
            // empty window carries no momentum.
            let elapsed_ms = now_ms.saturating_sub(s.start_time_ms);
            if elapsed_ms > 0 {
                let time_delta = elapsed_ms as f64 / VELOCITY_UNIT_MS;
                s.velocity.x = (s.position.x - s.start_position.x) / time_delta;
                s.velocity.y = (s.position.y - s.start_position.y) / time_delta;
            } else {
                s.velocity = Vector2::ZERO;
            }
            let max_velocity = s.max_velocity;
            s.velocity.clamp(-max_velocity, max_velocity);

            log::trace!(
                "released at ({:.1}, {:.1}), velocity ({:.3}, {:.3})",
                s.position.x,
                s.position.y,
                s.velocity.x,
                s.velocity.y
            );

            // Start values must not leak into later calculations.
            s.start_position = Vector2::ZERO;
            s.start_time_ms = 0;

            // All window-based math is done by now.
            s.samples.clear();
            s.sample_registration = None;

            let start_deceleration = s.velocity.x.abs() >= s.threshold
                || s.velocity.y.abs() >= s.threshold
                || s.bound_overflow.x != 0.0
                || s.bound_overflow.y != 0.0;
            (start_deceleration, s.up_listeners.clone())
        };

        if start_deceleration {
            decelerate(&self.state, &self.clock);
        }

        for listener in up_listeners.iter() {
            listener();
        }
    }
}

#[path = "tests/engine_tests.rs"]
#[cfg(test)]
mod tests;
