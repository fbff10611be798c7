//! The filtering decision layer and its per-call resolution machinery.
//!
//! This module provides:
//!
//! - **`spec`**: [`FilterSpec`] — the per-value decision set (allowed,
//!   excluded, replaced, and expansion attributes) and its pure visibility
//!   predicate.
//! - **`registry`**: [`FilterRegistry`] — the serialization-engine hook that
//!   correlates each wrapped value back to its rules through a caller-scoped,
//!   non-owning association table.
//! - **`scope`**: [`CallContext`] and [`CallScope`] — the scoped session
//!   identity isolating concurrent serialization calls.
//! - **`error`**: [`FilterError`] — resolution failures.
//!
//! Envelope construction and the serde glue live in the crate root modules;
//! everything here is engine-agnostic and can be driven directly by a custom
//! serializer through [`FilterRegistry::resolve`].

mod error;
mod registry;
mod scope;
mod spec;

pub use error::FilterError;
pub use registry::{
    ENVELOPE_FILTER_ID, EnvelopeView, FilterRegistry, FilterTarget, NameFilter, PayloadShape,
    VALUE_FILTER_ID, ValueIdentity,
};
pub use scope::{CallContext, CallScope, ContextId};
pub use spec::FilterSpec;
