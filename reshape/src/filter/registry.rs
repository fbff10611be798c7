//! Serialization-engine hook: correlating wrapped values with their rules.
//!
//! The registry owns the only shared mutable state in the crate, a
//! two-level association table:
//!
//! - outer level: the caller context performing one serialization call
//!   ([`ContextId`])
//! - inner level: wrapped-value identity (allocation address) mapped to a
//!   snapshot of the envelope's [`FilterSpec`]
//!
//! Both levels are identity-based and non-owning. The outer key must be the
//! call, not the value: a wrapped value may be an immutable singleton pulled
//! from a cache, so two concurrent calls can hold the exact same instance
//! with different rules, and keying by the value alone would make them
//! collide. The weak liveness handles at both levels mean the table never
//! keeps a context or a value alive; a call that aborts mid-serialization
//! leaves entries that are swept on the next envelope-level resolution.
//!
//! Entries are written during the envelope-level phase and consumed (read
//! once, then removed) during the value-level phase. A value-level
//! resolution without a matching registration is an unrecoverable
//! correlation failure: the engine invoked the phases out of their
//! documented order, and shaped output must never be silently unfiltered.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Weak};

use dashmap::DashMap;

use super::error::FilterError;
use super::scope::{CallContext, ContextCore, ContextId};
use super::spec::FilterSpec;

/// Filter identifier for the envelope-level resolution phase.
pub const ENVELOPE_FILTER_ID: &str = "reshape/envelope";

/// Filter identifier for the wrapped-value resolution phase.
pub const VALUE_FILTER_ID: &str = "reshape/value";

// =============================================================================
// ValueIdentity - Identity handle for a shared wrapped value
// =============================================================================

/// Identity handle for a shared wrapped value.
///
/// Identity is the value's allocation address; the weak handle proves the
/// allocation is still live at lookup time, so an address reused after a
/// drop can never match a stale registration.
#[derive(Clone)]
pub struct ValueIdentity {
    addr: usize,
    liveness: Weak<dyn Any + Send + Sync>,
}

impl ValueIdentity {
    /// Captures the identity of a shared value.
    pub fn of<T>(value: &Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let dyn_value: Arc<dyn Any + Send + Sync> = value.clone();
        let liveness: Weak<dyn Any + Send + Sync> = Arc::downgrade(&dyn_value);
        Self {
            addr: Arc::as_ptr(value) as usize,
            liveness,
        }
    }
}

impl fmt::Debug for ValueIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueIdentity({:#x})", self.addr)
    }
}

// =============================================================================
// FilterTarget - What one resolution request is about
// =============================================================================

/// The container shape of an envelope's payload, checked once during
/// envelope-level resolution.
///
/// When the payload is a collection, the engine renders each element as its
/// own value and resolves the value phase once per element, never once for
/// the collection; the shape tells the registry to pre-populate one
/// registration per element, all sharing the envelope's spec snapshot.
#[derive(Debug)]
pub enum PayloadShape {
    /// One wrapped value.
    Scalar(ValueIdentity),
    /// A collection of wrapped values.
    Sequence(Vec<ValueIdentity>),
    /// An array-like payload, iterated by index.
    Indexed(Vec<ValueIdentity>),
}

/// Engine-facing view of an envelope during envelope-level resolution.
pub struct EnvelopeView<'a> {
    spec: &'a FilterSpec,
    shape: PayloadShape,
}

impl<'a> EnvelopeView<'a> {
    /// Builds a view from an envelope's decision set and payload shape.
    pub fn new(spec: &'a FilterSpec, shape: PayloadShape) -> Self {
        Self { spec, shape }
    }
}

/// Target of one resolution request.
pub enum FilterTarget<'a> {
    /// The envelope itself (envelope-level phase).
    Envelope(EnvelopeView<'a>),
    /// A wrapped value about to be rendered (value-level phase).
    Value(ValueIdentity),
}

// =============================================================================
// NameFilter - Resolved name-inclusion predicate
// =============================================================================

/// Name-inclusion predicate resolved for one wrapped value.
///
/// Backed by the spec snapshot registered during the envelope-level phase.
/// A name is included iff the spec permits it and it is not marked
/// replaced: the natural value under a replaced name must never be emitted,
/// only the expansion value carrying the same name.
#[derive(Clone)]
pub struct NameFilter {
    spec: Arc<FilterSpec>,
}

impl NameFilter {
    /// Returns true iff the natural field `name` should appear in output.
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        self.spec.is_permitted(name) && !self.spec.is_replaced(name)
    }

    /// The permitted expansion entries to merge into the rendered output.
    pub fn expansion_entries(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.spec.expansion_entries()
    }

    /// The resolved decision set.
    #[must_use]
    pub fn rules(&self) -> &FilterSpec {
        &self.spec
    }
}

impl fmt::Debug for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NameFilter").field(&self.spec).finish()
    }
}

// =============================================================================
// FilterRegistry - The two-level association table
// =============================================================================

static GLOBAL: LazyLock<FilterRegistry> = LazyLock::new(FilterRegistry::new);

struct Registration {
    liveness: Weak<dyn Any + Send + Sync>,
    spec: Arc<FilterSpec>,
}

struct ContextEntries {
    liveness: Weak<ContextCore>,
    by_value: HashMap<usize, Registration>,
}

/// The serialization-engine hook.
///
/// One resolution entry point, [`resolve`](Self::resolve), serves both
/// phases; see the module docs for the table it maintains. The process-wide
/// instance used by the serde adapter is [`global`](Self::global);
/// independent instances can be built for tests or custom engines.
pub struct FilterRegistry {
    table: DashMap<ContextId, ContextEntries>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// The process-wide registry used by the serde adapter.
    #[must_use]
    pub fn global() -> &'static FilterRegistry {
        &GLOBAL
    }

    /// Resolves filtering for `target` within `context`.
    ///
    /// - `ENVELOPE_FILTER_ID` with an envelope target registers the
    ///   envelope's rules under each wrapped value identity and yields
    ///   `Ok(None)`: the envelope's own shape already exposes exactly the
    ///   wrapped value, so no name filtering applies at that level.
    /// - `VALUE_FILTER_ID` with a value target consumes the registration
    ///   made for that value in this context and yields the name predicate,
    ///   or [`FilterError::Correlation`] if none exists.
    /// - Any other combination yields `Ok(None)`: unsupported, the engine
    ///   applies no filtering.
    pub fn resolve(
        &self,
        context: &CallContext,
        filter_id: &str,
        target: FilterTarget<'_>,
    ) -> Result<Option<NameFilter>, FilterError> {
        match (filter_id, target) {
            (ENVELOPE_FILTER_ID, FilterTarget::Envelope(view)) => {
                self.register(context, &view);
                Ok(None)
            }
            (VALUE_FILTER_ID, FilterTarget::Value(identity)) => {
                self.consume(context, &identity).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Legacy single-identifier lookup retained for engines predating
    /// two-phase resolution.
    ///
    /// Never supported: without a target value there is nothing to
    /// correlate the rules to.
    pub fn resolve_by_id(&self, _filter_id: &str) -> Result<Option<NameFilter>, FilterError> {
        Err(FilterError::LegacyLookup)
    }

    /// Drops every registration held for `context`.
    ///
    /// Called by the scope guard when a serialization call ends; harmless
    /// if the context never registered anything.
    pub fn release(&self, context: ContextId) {
        self.table.remove(&context);
    }

    fn register(&self, context: &CallContext, view: &EnvelopeView<'_>) {
        // Entries of abandoned calls survive only until the next
        // registration; their context liveness is already dead.
        self.table
            .retain(|_, entries| entries.liveness.strong_count() > 0);

        let mut entries = self
            .table
            .entry(context.id())
            .or_insert_with(|| ContextEntries {
                liveness: context.downgrade(),
                by_value: HashMap::new(),
            });
        entries
            .by_value
            .retain(|_, registration| registration.liveness.strong_count() > 0);

        let spec = Arc::new(view.spec.clone());
        match &view.shape {
            PayloadShape::Scalar(identity) => {
                entries.insert(identity, &spec);
            }
            PayloadShape::Sequence(identities) | PayloadShape::Indexed(identities) => {
                for identity in identities {
                    entries.insert(identity, &spec);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            context = context.id().value(),
            entries = entries.by_value.len(),
            "registered filter rules"
        );
    }

    fn consume(
        &self,
        context: &CallContext,
        identity: &ValueIdentity,
    ) -> Result<NameFilter, FilterError> {
        let registration = self
            .table
            .get_mut(&context.id())
            .and_then(|mut entries| entries.by_value.remove(&identity.addr));

        match registration {
            Some(registration) if registration.liveness.strong_count() > 0 => {
                #[cfg(feature = "tracing")]
                tracing::trace!(context = context.id().value(), "consumed filter rules");
                Ok(NameFilter {
                    spec: registration.spec,
                })
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    context = context.id().value(),
                    "no filter rules registered for the value being rendered"
                );
                Err(FilterError::Correlation {
                    context: context.id(),
                })
            }
        }
    }

    #[cfg(test)]
    fn context_count(&self) -> usize {
        self.table.len()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextEntries {
    fn insert(&mut self, identity: &ValueIdentity, spec: &Arc<FilterSpec>) {
        self.by_value.insert(
            identity.addr,
            Registration {
                liveness: identity.liveness.clone(),
                spec: Arc::clone(spec),
            },
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
