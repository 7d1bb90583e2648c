use super::*;

use freewheel_core::{DefaultScheduler, Runtime};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

fn engine() -> (Runtime, MotionEngine) {
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    let engine = MotionEngine::new(runtime.tick_clock());
    (runtime, engine)
}

/// Drains at a 16 ms cadence until no tick re-arms; panics if the loop
/// refuses to settle.
fn drain_until_idle(runtime: &Runtime, mut now: u64) -> u64 {
    let mut ticks = 0;
    while runtime.has_pending_ticks() {
        now += 16;
        runtime.drain_tick_callbacks(now);
        ticks += 1;
        assert!(ticks < 10_000, "tick loop failed to terminate");
    }
    now
}

#[test]
fn release_velocity_reflects_the_drag_speed() {
    let (runtime, engine) = engine();
    // Keep the threshold out of reach so the raw estimate stays observable.
    engine.set_threshold(11.0);

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);

    // 100 px over 150 ms = 10 px per velocity unit.
    assert_eq!(engine.velocity(), Vector2::new(10.0, 0.0));
    assert!(!engine.is_decelerating());
    assert!(!runtime.has_pending_ticks());
}

#[test]
fn sub_threshold_release_schedules_no_ticks() {
    let (runtime, engine) = engine();

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(5.0, 0.0);
    engine.pointer_up(150);

    assert!(engine.velocity().x.abs() < DEFAULT_THRESHOLD);
    assert!(!engine.is_decelerating());
    assert!(!runtime.has_pending_ticks());
}

#[test]
fn release_above_threshold_decays_on_the_first_step() {
    let (_runtime, engine) = engine();

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);

    // The release step already ran one decay tick: 10 * (1 - 0.035),
    // truncated to three decimals.
    let velocity = engine.velocity().x;
    assert!(
        (velocity - 9.65).abs() < 0.0015,
        "expected ~9.65, got {velocity}"
    );
    let position = engine.position().x;
    assert!(
        (position - (100.0 + velocity)).abs() < 1e-9,
        "expected {}, got {position}",
        100.0 + velocity
    );
    assert!(engine.is_decelerating());
}

#[test]
fn deceleration_decays_strictly_and_terminates() {
    let (runtime, engine) = engine();

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);

    let mut now = 150;
    let mut last_speed = engine.velocity().x.abs();
    let mut ticks = 0;
    while runtime.has_pending_ticks() {
        now += 16;
        runtime.drain_tick_callbacks(now);
        let speed = engine.velocity().x.abs();
        assert!(
            speed < last_speed || speed == 0.0,
            "speed {speed} did not decay below {last_speed}"
        );
        last_speed = speed;
        ticks += 1;
        assert!(ticks < 10_000, "tick loop failed to terminate");
    }

    assert_eq!(engine.velocity(), Vector2::ZERO);
    assert!(!engine.is_decelerating());
    assert!(engine.position().x > 100.0);
}

#[test]
fn move_notifications_are_deduplicated() {
    let (_runtime, engine) = engine();
    let notifications = Rc::new(Cell::new(0u32));

    let count = Rc::clone(&notifications);
    engine.on_move(move |_, _, _, _| count.set(count.get() + 1));

    engine.pointer_down(5.0, 5.0, 0);
    assert_eq!(notifications.get(), 1);

    engine.pointer_move(5.0, 5.0);
    assert_eq!(notifications.get(), 1);

    engine.pointer_move(6.0, 5.0);
    assert_eq!(notifications.get(), 2);
}

#[test]
fn listeners_fire_in_registration_order() {
    let (_runtime, engine) = engine();
    let order = Rc::new(RefCell::new(Vec::new()));

    for tag in ["first", "second"] {
        let order = Rc::clone(&order);
        engine.on_move(move |_, _, _, _| order.borrow_mut().push(tag));
    }

    engine.pointer_down(1.0, 1.0, 0);
    assert_eq!(*order.borrow(), vec!["first", "second"]);
}

#[test]
fn up_listeners_fire_on_every_release() {
    let (_runtime, engine) = engine();
    let releases = Rc::new(Cell::new(0u32));

    let count = Rc::clone(&releases);
    engine.on_up(move || count.set(count.get() + 1));

    // Not dragging: ignored.
    engine.pointer_up(10);
    assert_eq!(releases.get(), 0);

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_up(20);
    assert_eq!(releases.get(), 1);
}

#[test]
fn rejected_down_predicate_prevents_the_drag() {
    let (runtime, engine) = engine();
    let seen = Rc::new(RefCell::new(None));

    let seen_by_predicate = Rc::clone(&seen);
    engine.on_down(move |x, y| {
        *seen_by_predicate.borrow_mut() = Some((x, y));
        false
    });

    engine.pointer_down(12.0, 34.0, 0);

    assert_eq!(*seen.borrow(), Some((12.0, 34.0)));
    assert!(!engine.is_dragging());
    assert!(!runtime.has_pending_ticks());

    // Moves without a drag are ignored.
    engine.pointer_move(50.0, 50.0);
    assert_eq!(engine.position(), Vector2::ZERO);
}

#[test]
fn rigid_bounds_clamp_and_invert_the_velocity() {
    let (runtime, engine) = engine();
    engine.set_bounds(0.0, 100.0, 0.0, 0.0);
    engine.set_restitution(0.5);

    let positions = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&positions);
    engine.on_move(move |x, _, _, _| seen.borrow_mut().push(x));

    engine.pointer_down(50.0, 0.0, 0);
    engine.pointer_move(90.0, 0.0);
    engine.pointer_up(15);

    // 40 px over one velocity unit slams into the wall on the first step.
    assert_eq!(engine.position().x, 100.0);
    let velocity = engine.velocity().x;
    assert!(
        velocity < 0.0 && (velocity + 19.3).abs() < 0.01,
        "expected ~-19.3, got {velocity}"
    );

    drain_until_idle(&runtime, 15);
    for x in positions.borrow().iter() {
        assert!((0.0..=100.0).contains(x), "position {x} left the bounds");
    }
    assert_eq!(engine.velocity(), Vector2::ZERO);
}

#[test]
fn zero_restitution_stops_dead_at_the_wall() {
    let (runtime, engine) = engine();
    engine.set_bounds(0.0, 100.0, 0.0, 0.0);
    engine.set_restitution(0.0);

    engine.pointer_down(50.0, 0.0, 0);
    engine.pointer_move(90.0, 0.0);
    engine.pointer_up(15);

    assert_eq!(engine.position().x, 100.0);
    assert_eq!(engine.velocity(), Vector2::ZERO);
    assert!(!engine.is_decelerating());
    assert!(!runtime.has_pending_ticks());
}

#[test]
fn bounds_on_one_axis_leave_the_other_free() {
    let (_runtime, engine) = engine();
    engine.set_bounds(0.0, 0.0, 0.0, 100.0);

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(500.0, 150.0);

    assert_eq!(engine.position(), Vector2::new(500.0, 100.0));
}

#[test]
fn zero_rect_bounds_mean_unbounded() {
    let (_runtime, engine) = engine();
    engine.set_bounds(0.0, 0.0, 0.0, 0.0);
    assert!(!engine.has_bounds());

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(10_000.0, -10_000.0);
    assert_eq!(engine.position(), Vector2::new(10_000.0, -10_000.0));
}

#[test]
fn elastic_bounds_record_the_signed_overflow() {
    let (_runtime, engine) = engine();
    engine.set_bounds(0.0, 100.0, 0.0, 0.0);
    engine.set_restitution(-0.5);

    engine.pointer_down(50.0, 0.0, 0);
    engine.pointer_move(110.0, 0.0);

    // Not clamped; penetration is signed toward the bound.
    assert_eq!(engine.position().x, 110.0);
    assert_eq!(engine.bound_overflow().x, -10.0);
}

#[test]
fn elastic_recovery_is_softer_while_dragging() {
    let (_runtime, engine) = engine();
    engine.set_bounds(0.0, 100.0, 0.0, 0.0);
    engine.set_restitution(-0.5);

    engine.pointer_down(50.0, 0.0, 0);
    engine.pointer_move(110.0, 0.0);
    engine.pointer_move(110.0, 0.0);

    // Second evaluation pulls back by overflow * (1 + r/2) with the halved
    // drag-time coefficient: 110 - 10 * 0.75.
    assert_eq!(engine.position().x, 102.5);
    assert_eq!(engine.bound_overflow().x, -2.5);
}

#[test]
fn elastic_overflow_recovers_toward_the_bound_after_release() {
    let (runtime, engine) = engine();
    engine.set_bounds(0.0, 100.0, 0.0, 0.0);
    engine.set_restitution(-0.5);

    engine.pointer_down(50.0, 0.0, 0);
    engine.pointer_move(110.0, 0.0);
    // Slow release: deceleration starts anyway because overflow is pending.
    engine.pointer_up(1000);
    assert!(engine.is_decelerating());

    let mut now = 1000;
    let mut last_magnitude = engine.bound_overflow().x.abs();
    for _ in 0..200 {
        if !runtime.has_pending_ticks() {
            break;
        }
        now += 16;
        runtime.drain_tick_callbacks(now);
        let magnitude = engine.bound_overflow().x.abs();
        assert!(
            magnitude <= last_magnitude,
            "overflow grew from {last_magnitude} to {magnitude}"
        );
        last_magnitude = magnitude;
    }

    assert!(last_magnitude < 0.01);
    assert!((engine.position().x - 100.0).abs() < 0.01);
}

#[test]
fn release_velocity_is_clamped_to_the_maximum() {
    let (_runtime, engine) = engine();
    engine.set_threshold(200.0);

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(1000.0, 0.0);
    engine.pointer_up(15);
    assert_eq!(engine.velocity().x, DEFAULT_MAX_VELOCITY);

    engine.set_max_velocity(5.0);
    engine.pointer_down(0.0, 0.0, 100);
    engine.pointer_move(1000.0, 0.0);
    engine.pointer_up(115);
    assert_eq!(engine.velocity().x, 5.0);
}

#[test]
fn negative_max_velocity_is_floored_at_zero() {
    let (_runtime, engine) = engine();
    engine.set_max_velocity(-3.0);
    assert_eq!(engine.max_velocity(), 0.0);
}

#[test]
fn setters_clamp_their_coefficients() {
    let (_runtime, engine) = engine();

    engine.set_friction(1.5);
    assert_eq!(engine.friction(), Vector2::new(1.0, 1.0));

    engine.set_restitution(-2.0);
    assert_eq!(engine.restitution(), Vector2::new(-1.0, -1.0));

    engine.set_restitution(1.5);
    assert_eq!(engine.restitution(), Vector2::new(1.0, 1.0));
}

#[test]
fn sample_window_reanchors_velocity_to_recent_motion() {
    let (runtime, engine) = engine();

    // Hold still for ~200 ms while the sampling loop runs...
    engine.pointer_down(0.0, 0.0, 0);
    let mut now = 0;
    while now < 192 {
        now += 16;
        runtime.drain_tick_callbacks(now);
    }
    assert!(
        engine.state.borrow().samples.len() <= 4,
        "samples outside the retention window must be evicted"
    );

    // ...then flick. The estimate must cover only the final window, not the
    // full 200 ms.
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(200);

    let naive = 100.0 / (200.0 / 15.0);
    let velocity = engine.velocity().x;
    assert!(
        velocity > 20.0,
        "expected a window-local estimate, got {velocity} (naive would be {naive:.1})"
    );
    assert!(engine.state.borrow().samples.is_empty());
}

#[test]
fn same_millisecond_release_carries_no_momentum() {
    let (runtime, engine) = engine();

    engine.pointer_down(0.0, 0.0, 50);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(50);

    assert_eq!(engine.velocity(), Vector2::ZERO);
    assert!(!runtime.has_pending_ticks());
}

#[test]
fn stop_lets_at_most_one_more_tick_fire() {
    let (runtime, engine) = engine();

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);
    assert!(runtime.has_pending_ticks());

    engine.stop();
    let position = engine.position();

    // The already-armed tick still fires, does nothing, and does not re-arm.
    runtime.drain_tick_callbacks(166);
    assert_eq!(engine.position(), position);
    assert!(!runtime.has_pending_ticks());
}

#[test]
fn start_after_stop_reenables_deceleration() {
    let (runtime, engine) = engine();

    engine.stop();
    engine.start();

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);

    assert!(engine.is_decelerating());
    assert!(runtime.has_pending_ticks());
}

#[test]
fn destroy_cancels_pending_ticks_and_listeners() {
    let (runtime, engine) = engine();
    let notifications = Rc::new(Cell::new(0u32));

    let count = Rc::clone(&notifications);
    engine.on_move(move |_, _, _, _| count.set(count.get() + 1));

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);
    assert!(runtime.has_pending_ticks());

    engine.destroy();
    assert!(!runtime.has_pending_ticks());

    let before = notifications.get();
    engine.pointer_down(0.0, 0.0, 200);
    engine.pointer_move(10.0, 0.0);
    assert_eq!(notifications.get(), before);
}

#[test]
fn set_position_with_reset_kills_an_active_deceleration() {
    let (runtime, engine) = engine();

    engine.pointer_down(0.0, 0.0, 0);
    engine.pointer_move(100.0, 0.0);
    engine.pointer_up(150);
    assert!(engine.is_decelerating());

    engine.set_position(0.0, 0.0, true);
    assert_eq!(engine.velocity(), Vector2::ZERO);

    runtime.drain_tick_callbacks(166);
    assert!(!runtime.has_pending_ticks());
    assert_eq!(engine.position(), Vector2::ZERO);
}

#[test]
fn update_does_not_renotify_an_unchanged_position() {
    let (_runtime, engine) = engine();
    let notifications = Rc::new(Cell::new(0u32));

    let count = Rc::clone(&notifications);
    engine.on_move(move |_, _, _, _| count.set(count.get() + 1));

    engine.pointer_down(5.0, 5.0, 0);
    let after_down = notifications.get();

    engine.update();
    engine.update();
    assert_eq!(notifications.get(), after_down);
}
