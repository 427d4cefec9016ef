use core::fmt::Display;
use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Identity of one execution context.
///
/// Globals, handles and cached access sites all belong to the context that
/// created them. Comparing ids is how a cached fast path notices it is being
/// replayed against a different context.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ContextId(NonZeroUsize);

impl Default for ContextId {
    /// Draws a fresh id from a process-wide counter.
    fn default() -> Self {
        // a usize counter does not wrap in practice
        static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(1);
        let id = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroUsize::new(id).unwrap_or(NonZeroUsize::MIN))
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_labelled() {
        let a = ContextId::default();
        let b = ContextId::default();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), format!("context#{}", a.0));
    }
}
