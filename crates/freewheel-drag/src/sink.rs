//! The engine-consumer contract.
//!
//! Any binding that turns engine output into a visual transform (the drag
//! binding here, a rotation binding elsewhere) exposes the same three-call
//! surface. The engine side never learns which kind of sink it feeds.

use std::cell::RefCell;
use std::rc::Rc;

use freewheel_motion::MotionEngine;

/// Consumes engine position/velocity and produces a visual transform.
pub trait MotionSink {
    /// Pointer-down hit decision, in the engine's coordinate space.
    /// Returning false rejects the drag.
    fn handle_down(&mut self, x: f64, y: f64) -> bool;

    /// Physics output for one notification.
    fn handle_move(&mut self, x: f64, y: f64, velocity_x: f64, velocity_y: f64);

    /// Release notification.
    fn handle_up(&mut self);
}

/// Wires a sink onto an engine's three callback slots.
///
/// The engine keeps only weak references; once the caller drops the sink the
/// callbacks fall silent and a pending down decision resolves to false.
pub fn connect_sink(engine: &MotionEngine, sink: &Rc<RefCell<dyn MotionSink>>) {
    let weak = Rc::downgrade(sink);
    engine.on_down(move |x, y| match weak.upgrade() {
        Some(sink) => sink.borrow_mut().handle_down(x, y),
        None => false,
    });

    let weak = Rc::downgrade(sink);
    engine.on_move(move |x, y, velocity_x, velocity_y| {
        if let Some(sink) = weak.upgrade() {
            sink.borrow_mut().handle_move(x, y, velocity_x, velocity_y);
        }
    });

    let weak = Rc::downgrade(sink);
    engine.on_up(move || {
        if let Some(sink) = weak.upgrade() {
            sink.borrow_mut().handle_up();
        }
    });
}
