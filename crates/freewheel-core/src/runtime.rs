use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use web_time::Instant;

use crate::platform::TickScheduler;

pub type TickCallbackId = u64;

struct TickCallbackEntry {
    id: TickCallbackId,
    callback: Option<Box<dyn FnOnce(u64) + 'static>>,
}

struct RuntimeInner {
    scheduler: Arc<dyn TickScheduler>,
    tick_callbacks: RefCell<VecDeque<TickCallbackEntry>>,
    next_tick_callback_id: Cell<TickCallbackId>,
    started_at: Instant,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn TickScheduler>) -> Self {
        Self {
            scheduler,
            tick_callbacks: RefCell::new(VecDeque::new()),
            next_tick_callback_id: Cell::new(0),
            started_at: Instant::now(),
        }
    }

    fn register_tick_callback(&self, callback: Box<dyn FnOnce(u64) + 'static>) -> TickCallbackId {
        let id = self.next_tick_callback_id.get();
        self.next_tick_callback_id.set(id + 1);
        self.tick_callbacks
            .borrow_mut()
            .push_back(TickCallbackEntry {
                id,
                callback: Some(callback),
            });
        self.scheduler.schedule_tick();
        id
    }

    fn cancel_tick_callback(&self, id: TickCallbackId) {
        let mut callbacks = self.tick_callbacks.borrow_mut();
        if let Some(index) = callbacks.iter().position(|entry| entry.id == id) {
            callbacks.remove(index);
        }
    }

    fn drain_tick_callbacks(&self, now_ms: u64) {
        // Take the current queue before invoking anything: callbacks that
        // re-register during the drain must wait for the next tick.
        let mut callbacks = self.tick_callbacks.borrow_mut();
        let mut pending: Vec<Box<dyn FnOnce(u64) + 'static>> = Vec::with_capacity(callbacks.len());
        while let Some(mut entry) = callbacks.pop_front() {
            if let Some(callback) = entry.callback.take() {
                pending.push(callback);
            }
        }
        drop(callbacks);
        for callback in pending {
            callback(now_ms);
        }
    }

    fn has_pending_ticks(&self) -> bool {
        !self.tick_callbacks.borrow().is_empty()
    }
}

/// Owns the tick callback queue. One per host event loop.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn TickScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn tick_clock(&self) -> crate::TickClock {
        crate::TickClock::new(self.handle())
    }

    /// Runs every callback that was pending when the drain started, passing
    /// `now_ms` as the tick timestamp.
    pub fn drain_tick_callbacks(&self, now_ms: u64) {
        self.inner.drain_tick_callbacks(now_ms);
    }

    /// Drains with a timestamp taken from the runtime's own monotonic clock.
    ///
    /// Convenience for hosts without a frame timestamp of their own; returns
    /// the stamp that was used.
    pub fn drain_tick_callbacks_now(&self) -> u64 {
        let now_ms = self.inner.started_at.elapsed().as_millis() as u64;
        self.inner.drain_tick_callbacks(now_ms);
        now_ms
    }

    /// True while any callback is queued; hosts use this to decide whether
    /// to keep their frame loop armed.
    pub fn has_pending_ticks(&self) -> bool {
        self.inner.has_pending_ticks()
    }
}

/// Weak reference to a [`Runtime`]; every operation on a dead runtime is a
/// no-op.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Weak<RuntimeInner>,
}

impl RuntimeHandle {
    pub fn register_tick_callback(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> Option<TickCallbackId> {
        match self.inner.upgrade() {
            Some(inner) => Some(inner.register_tick_callback(Box::new(callback))),
            None => {
                log::warn!("tick callback registered against a dropped runtime");
                None
            }
        }
    }

    pub fn cancel_tick_callback(&self, id: TickCallbackId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_tick_callback(id);
        }
    }

    pub fn has_pending_ticks(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.has_pending_ticks())
            .unwrap_or(false)
    }

    pub fn tick_clock(&self) -> crate::TickClock {
        crate::TickClock::new(self.clone())
    }
}
