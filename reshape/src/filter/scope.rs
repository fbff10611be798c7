//! Scoped session identity for one serialization call.
//!
//! Two concurrent calls may serialize the very same shared instance under
//! different rules, so the registry keys its association table by the call,
//! never by anything global. This module provides that key:
//!
//! - [`CallContext`]: a cheaply cloneable handle with a process-unique id;
//!   its liveness ends when the last clone is dropped
//! - [`CallScope`]: an RAII guard making a context ambient for the current
//!   thread and releasing the context's registry entries on exit
//!
//! The ambient context is a thread-local stack. Serialization is
//! synchronous within a call and never migrates threads mid-render, so the
//! innermost stack entry is always the in-flight call.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::registry::FilterRegistry;

// =============================================================================
// CallContext - Identity of one in-flight serialization call
// =============================================================================

/// Process-unique identifier of one serialization call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// The raw numeric id.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anchor allocation whose liveness bounds a context's registry entries.
pub(crate) struct ContextCore {
    id: ContextId,
}

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one in-flight serialization call.
///
/// Used as the outer key of the registry's association table. The registry
/// holds it weakly: dropping every clone makes the context's entries
/// eligible for sweeping even if no scope guard ran.
#[derive(Clone)]
pub struct CallContext {
    core: Arc<ContextCore>,
}

impl CallContext {
    /// Mints a context with a fresh id.
    #[must_use]
    pub fn fresh() -> Self {
        let id = ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed));
        Self {
            core: Arc::new(ContextCore { id }),
        }
    }

    /// The context's id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.core.id
    }

    /// Non-owning liveness handle stored by the registry.
    pub(crate) fn downgrade(&self) -> Weak<ContextCore> {
        Arc::downgrade(&self.core)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallContext").field(&self.core.id).finish()
    }
}

// =============================================================================
// CallScope - RAII guard for the ambient context
// =============================================================================

thread_local! {
    static AMBIENT: RefCell<Vec<CallContext>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard making a [`CallContext`] ambient on the current thread.
///
/// The serde adapter joins the innermost ambient scope if one exists, so an
/// envelope nested inside a larger serialization resolves under the same
/// context as its caller; a fresh top-level call gets a fresh context.
///
/// Dropping an owning guard pops the ambient stack and eagerly releases the
/// context's entries from the global registry, so a finished (or failed)
/// call cannot leave registrations behind.
#[must_use = "the scope ends when the guard is dropped"]
pub struct CallScope {
    context: CallContext,
    owns: bool,
}

impl CallScope {
    /// Enters a fresh scope on the current thread.
    pub fn enter() -> Self {
        let context = CallContext::fresh();
        AMBIENT.with(|stack| stack.borrow_mut().push(context.clone()));
        Self {
            context,
            owns: true,
        }
    }

    /// Joins the innermost ambient scope, entering a fresh one if the
    /// thread has none.
    pub fn enter_or_join() -> Self {
        Self::current().map_or_else(Self::enter, |context| Self {
            context,
            owns: false,
        })
    }

    /// The innermost ambient context, if any.
    #[must_use]
    pub fn current() -> Option<CallContext> {
        AMBIENT.with(|stack| stack.borrow().last().cloned())
    }

    /// The context this scope resolves under.
    #[must_use]
    pub fn context(&self) -> &CallContext {
        &self.context
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        if !self.owns {
            return;
        }
        AMBIENT.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some_and(|context| context.id() == self.context.id()));
        });
        FilterRegistry::global().release(self.context.id());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::{CallContext, CallScope};

    mod contexts {
        use super::*;

        #[test]
        fn fresh_contexts_have_distinct_ids() {
            let first = CallContext::fresh();
            let second = CallContext::fresh();
            assert_ne!(first.id(), second.id());
        }

        #[test]
        fn clones_share_one_id() {
            let context = CallContext::fresh();
            assert_eq!(context.id(), context.clone().id());
        }

        #[test]
        fn liveness_ends_with_the_last_clone() {
            let context = CallContext::fresh();
            let weak = context.downgrade();
            let clone = context.clone();
            drop(context);
            assert!(weak.upgrade().is_some());
            drop(clone);
            assert!(weak.upgrade().is_none());
        }
    }

    mod scopes {
        use super::*;

        #[test]
        fn no_ambient_context_outside_a_scope() {
            assert!(CallScope::current().is_none());
        }

        #[test]
        fn enter_makes_a_context_ambient_until_drop() {
            let scope = CallScope::enter();
            let current = CallScope::current().expect("scope is ambient");
            assert_eq!(current.id(), scope.context().id());
            drop(scope);
            assert!(CallScope::current().is_none());
        }

        #[test]
        fn join_shares_the_enclosing_context() {
            let outer = CallScope::enter();
            let inner = CallScope::enter_or_join();
            assert_eq!(inner.context().id(), outer.context().id());
            drop(inner);
            // Joining does not pop the enclosing scope.
            assert!(CallScope::current().is_some());
            drop(outer);
            assert!(CallScope::current().is_none());
        }

        #[test]
        fn join_without_an_enclosing_scope_enters_fresh() {
            let scope = CallScope::enter_or_join();
            assert!(CallScope::current().is_some());
            drop(scope);
            assert!(CallScope::current().is_none());
        }

        #[test]
        fn nested_scopes_unwind_in_order() {
            let outer = CallScope::enter();
            let inner = CallScope::enter();
            assert_ne!(outer.context().id(), inner.context().id());
            let current = CallScope::current().expect("inner scope is ambient");
            assert_eq!(current.id(), inner.context().id());
            drop(inner);
            let current = CallScope::current().expect("outer scope is ambient");
            assert_eq!(current.id(), outer.context().id());
        }
    }
}
