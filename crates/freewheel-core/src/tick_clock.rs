use crate::runtime::RuntimeHandle;
use crate::TickCallbackId;

/// Hands out one-shot tick callbacks against the owning runtime.
///
/// Loops that want to run every tick re-register themselves from inside
/// their callback, holding the returned registration so a drop cancels the
/// loop.
#[derive(Clone)]
pub struct TickClock {
    runtime: RuntimeHandle,
}

impl TickClock {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.clone()
    }

    /// Schedules `callback` for the next tick, receiving the tick timestamp
    /// in milliseconds.
    pub fn with_tick_millis(&self, callback: impl FnOnce(u64) + 'static) -> TickRegistration {
        let runtime = self.runtime.clone();
        match runtime.register_tick_callback(callback) {
            Some(id) => TickRegistration::new(runtime, id),
            None => TickRegistration::inactive(runtime),
        }
    }
}

/// Keeps a scheduled tick callback alive; dropping it cancels the callback.
pub struct TickRegistration {
    runtime: RuntimeHandle,
    id: Option<TickCallbackId>,
}

impl TickRegistration {
    fn new(runtime: RuntimeHandle, id: TickCallbackId) -> Self {
        Self {
            runtime,
            id: Some(id),
        }
    }

    fn inactive(runtime: RuntimeHandle) -> Self {
        Self { runtime, id: None }
    }

    pub fn cancel(mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_tick_callback(id);
        }
    }
}

impl Drop for TickRegistration {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_tick_callback(id);
        }
    }
}
