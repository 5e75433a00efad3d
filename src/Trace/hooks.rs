// Capability interface the instrumentation layer calls into.
//
// Whatever wires the program up (compiler hooks, hand-inserted calls, a
// sampler) only needs something implementing `TraceHooks`.

use std::io::Write;
use std::sync::Arc;

use super::recorder::TraceRecorder;
use crate::Core::clock::Clock;

pub trait TraceHooks: Send + Sync {
    fn on_enter(&self, function_id: usize, caller_id: usize);
    fn on_exit(&self, function_id: usize, caller_id: usize);

    /// Emit an enter event now and the matching exit when the guard drops.
    fn scope(&self, function_id: usize, caller_id: usize) -> TraceScope<'_, Self>
    where
        Self: Sized,
    {
        self.on_enter(function_id, caller_id);
        TraceScope {
            hooks: self,
            function_id,
            caller_id,
        }
    }
}

impl<W: Write + Send, C: Clock> TraceHooks for TraceRecorder<W, C> {
    #[inline]
    fn on_enter(&self, function_id: usize, caller_id: usize) {
        TraceRecorder::on_enter(self, function_id, caller_id)
    }

    #[inline]
    fn on_exit(&self, function_id: usize, caller_id: usize) {
        TraceRecorder::on_exit(self, function_id, caller_id)
    }
}

impl<T: TraceHooks + ?Sized> TraceHooks for Arc<T> {
    fn on_enter(&self, function_id: usize, caller_id: usize) {
        (**self).on_enter(function_id, caller_id)
    }

    fn on_exit(&self, function_id: usize, caller_id: usize) {
        (**self).on_exit(function_id, caller_id)
    }
}

/// Guard returned by [`TraceHooks::scope`].
pub struct TraceScope<'a, H: TraceHooks> {
    hooks: &'a H,
    function_id: usize,
    caller_id: usize,
}

impl<H: TraceHooks> Drop for TraceScope<'_, H> {
    fn drop(&mut self) {
        self.hooks.on_exit(self.function_id, self.caller_id);
    }
}
