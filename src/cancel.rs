use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation signal shared between a walker and its callers.
///
/// Scopes form a tree: cancelling a scope cancels every child derived from it,
/// while cancelling a child leaves its parent untouched. Clones share the
/// same signal, so a clone can be moved to another thread and cancelled from
/// there at any time.
#[derive(Clone, Debug, Default)]
pub struct CancelScope {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    parent: Option<CancelScope>,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child scope that observes this scope's cancellation.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether this scope or any of its ancestors has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if s.inner.cancelled.load(Ordering::Relaxed) {
                return true;
            }
            scope = s.inner.parent.as_ref();
        }
        false
    }
}
