//! Scoped privilege elevation for trusted internal call paths
//!
//! An [`AuthorizationContext`] carries the bypass state of one logical
//! operation. It is created per operation and propagated explicitly — by
//! passing (or cloning) the handle into whatever task continues the work —
//! never through implicit thread-local inheritance, so elevation cannot leak
//! into unrelated concurrent operations. Unrelated work gets its own fresh
//! context.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Bypass state of one logical execution
///
/// State machine: `Checking` (depth 0) and `Bypassed(depth >= 1)`. Entering
/// a bypass scope increments the depth, leaving decrements it; nested scopes
/// therefore compose, and leaving an inner scope keeps the outer one active.
/// Exit is guaranteed on every path, including panics, via the RAII
/// [`BypassGuard`].
#[derive(Debug, Clone, Default)]
pub struct AuthorizationContext {
    depth: Arc<AtomicU32>,
}

impl AuthorizationContext {
    /// Fresh context in the `Checking` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an elevation scope is currently active
    pub fn is_bypassed(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Current bypass nesting depth (0 = `Checking`)
    pub fn bypass_depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }

    /// Enter a bypass scope, leaving it when the guard drops
    pub fn enter_bypass(&self) -> BypassGuard {
        self.depth.fetch_add(1, Ordering::SeqCst);
        BypassGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    /// Run a closure with authorization bypassed
    ///
    /// Every check performed within the closure's dynamic extent against
    /// this context reports "authorized" without consulting permission data.
    pub fn run_without_authorization<R>(&self, block: impl FnOnce() -> R) -> R {
        let _guard = self.enter_bypass();
        block()
    }

    /// Run a future with authorization bypassed
    ///
    /// The guard is held across await points, so checks performed anywhere
    /// in the future's execution against this context are bypassed.
    pub async fn without_authorization<F, R>(&self, block: F) -> R
    where
        F: Future<Output = R>,
    {
        let _guard = self.enter_bypass();
        block.await
    }
}

/// RAII handle for an active bypass scope
///
/// Dropping the guard exits the scope; this happens on normal completion,
/// early returns, and unwinding alike.
#[must_use = "the bypass ends as soon as the guard is dropped"]
pub struct BypassGuard {
    depth: Arc<AtomicU32>,
}

impl Drop for BypassGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checking_by_default() {
        let ctx = AuthorizationContext::new();
        assert!(!ctx.is_bypassed());
        assert_eq!(ctx.bypass_depth(), 0);
    }

    #[test]
    fn test_nested_scopes_keep_outer_active() {
        let ctx = AuthorizationContext::new();

        let outer = ctx.enter_bypass();
        assert_eq!(ctx.bypass_depth(), 1);

        {
            let _inner = ctx.enter_bypass();
            assert_eq!(ctx.bypass_depth(), 2);
        }

        // Inner scope exited, outer still active.
        assert_eq!(ctx.bypass_depth(), 1);
        assert!(ctx.is_bypassed());

        drop(outer);
        assert!(!ctx.is_bypassed());
    }

    #[test]
    fn test_closure_restores_state() {
        let ctx = AuthorizationContext::new();
        let result = ctx.run_without_authorization(|| {
            assert!(ctx.is_bypassed());
            42
        });
        assert_eq!(result, 42);
        assert!(!ctx.is_bypassed());
    }

    #[test]
    fn test_panic_still_exits_scope() {
        let ctx = AuthorizationContext::new();
        let panicking = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.run_without_authorization(|| panic!("boom"));
        }));
        assert!(panicking.is_err());
        assert!(!ctx.is_bypassed());
    }

    #[tokio::test]
    async fn test_async_scope_spans_awaits() {
        let ctx = AuthorizationContext::new();
        ctx.without_authorization(async {
            assert!(ctx.is_bypassed());
            tokio::task::yield_now().await;
            assert!(ctx.is_bypassed());
        })
        .await;
        assert!(!ctx.is_bypassed());
    }

    #[tokio::test]
    async fn test_unrelated_contexts_do_not_inherit() {
        let elevated = AuthorizationContext::new();
        let unrelated = AuthorizationContext::new();

        elevated
            .without_authorization(async {
                assert!(elevated.is_bypassed());
                assert!(!unrelated.is_bypassed());
            })
            .await;
    }
}
