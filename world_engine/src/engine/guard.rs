//! Scoped ownership of the time cursor.

use std::ops::{Deref, DerefMut};
use timeline::Time;

use super::Engine;

/// Mutable access to the engine that puts its time back when dropped.
///
/// [`call`](TimeGuard::call) also restores the time after each call, so a
/// sequence of calls through one guard all start from the same time.
pub struct TimeGuard<'a> {
    engine: &'a mut Engine,
    saved: Time,
}

impl<'a> TimeGuard<'a> {
    pub(crate) fn new(engine: &'a mut Engine) -> Self {
        let saved = engine.time().clone();
        Self { engine, saved }
    }

    /// The time that will be restored.
    pub fn saved(&self) -> &Time {
        &self.saved
    }

    /// Run `f` against the engine, then restore the saved time whatever `f` returned.
    pub fn call<R>(&mut self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let out = f(self.engine);
        self.restore();
        out
    }

    fn restore(&mut self) {
        self.engine.time = self.saved.clone();
    }
}

impl Deref for TimeGuard<'_> {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        self.engine
    }
}

impl DerefMut for TimeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for TimeGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
