//! Effect Stack
//!
//! The effect stack tracks which effect is currently running. Property reads
//! are attributed to the effect on top of the stack, which is what makes
//! dependency tracking automatic.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one stack. Running an effect pushes
//! it and returns a guard; dropping the guard pops it and restores whatever
//! effect was running before. Nested effects therefore attribute their reads
//! to themselves, and the enclosing effect becomes active again as soon as
//! the inner one returns.

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::effect::Effect;
use super::ids::EffectId;

/// LIFO of currently-executing effects.
pub(crate) struct EffectStack {
    frames: Mutex<SmallVec<[Effect; 4]>>,
}

impl EffectStack {
    /// Create an empty stack.
    pub(crate) fn new() -> Self {
        Self {
            frames: Mutex::new(SmallVec::new()),
        }
    }

    /// Push `effect` as the active effect until the guard is dropped.
    pub(crate) fn enter(&self, effect: Effect) -> StackGuard<'_> {
        let id = effect.id();
        self.frames.lock().push(effect);
        StackGuard { stack: self, id }
    }

    /// The effect on top of the stack, if any.
    pub(crate) fn active(&self) -> Option<Effect> {
        self.frames.lock().last().cloned()
    }

    /// ID of the effect on top of the stack, if any.
    pub(crate) fn active_id(&self) -> Option<EffectId> {
        self.frames.lock().last().map(Effect::id)
    }

    /// Number of effects currently running, innermost included.
    pub(crate) fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

/// Guard that pops the stack when dropped.
///
/// Keeps the stack balanced even if the computation panics.
pub(crate) struct StackGuard<'a> {
    stack: &'a EffectStack,
    id: EffectId,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        // Bind first so the frame is released after the lock.
        let popped = self.stack.frames.lock().pop();

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.id,
                "effect stack mismatch: expected {}, got {}",
                self.id,
                effect.id()
            );
        }
    }
}
