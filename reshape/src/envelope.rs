//! The wrapper carrying a shared value together with its filtering rules.
//!
//! This module provides:
//!
//! - [`Payload<T>`]: the closed container shape of the wrapped value(s)
//! - [`Envelope<T>`]: the [`FilterSpec`]-bearing wrapper handed to the
//!   serializer in place of the value

use std::sync::Arc;

use serde_json::Value;

use crate::filter::{EnvelopeView, FilterSpec, PayloadShape, ValueIdentity};

// =============================================================================
// Payload - Container shape of the wrapped value(s)
// =============================================================================

/// Container shape of an envelope's wrapped value(s).
///
/// Wrapped values are `Arc`-shared: instance identity (the allocation
/// address) is what correlates a value back to its rules during rendering,
/// and a shared singleton keeps one identity across every caller holding
/// it. The wrapped values are never mutated.
///
/// Shaping applies to the fields of each wrapped value. A value that is
/// itself a collection (say `Arc<Vec<T>>`) renders as an opaque array with
/// nothing to filter; wrap the elements instead (`Sequence`/`Indexed`) so
/// each one is shaped on its own.
#[derive(Debug)]
pub enum Payload<T> {
    /// One wrapped value.
    Single(Arc<T>),
    /// A collection of wrapped values, each rendered (and filtered) as its
    /// own output object.
    Sequence(Vec<Arc<T>>),
    /// An array-like payload of wrapped values.
    Indexed(Box<[Arc<T>]>),
}

impl<T> Payload<T> {
    /// Iterates the shared values in rendering order.
    pub fn values(&self) -> std::slice::Iter<'_, Arc<T>> {
        match self {
            Self::Single(value) => std::slice::from_ref(value).iter(),
            Self::Sequence(values) => values.iter(),
            Self::Indexed(values) => values.iter(),
        }
    }

    /// Number of wrapped values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Sequence(values) => values.len(),
            Self::Indexed(values) => values.len(),
        }
    }

    /// True iff the payload holds no values (an empty collection).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Payload<T>
where
    T: Send + Sync + 'static,
{
    /// The shape handed to the registry during envelope-level resolution.
    pub(crate) fn shape(&self) -> PayloadShape {
        match self {
            Self::Single(value) => PayloadShape::Scalar(ValueIdentity::of(value)),
            Self::Sequence(values) => {
                PayloadShape::Sequence(values.iter().map(ValueIdentity::of).collect())
            }
            Self::Indexed(values) => {
                PayloadShape::Indexed(values.iter().map(ValueIdentity::of).collect())
            }
        }
    }
}

// Cloning shares the same allocations; identity is preserved.
impl<T> Clone for Payload<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Single(value) => Self::Single(Arc::clone(value)),
            Self::Sequence(values) => Self::Sequence(values.clone()),
            Self::Indexed(values) => Self::Indexed(values.clone()),
        }
    }
}

impl<T> From<Arc<T>> for Payload<T> {
    fn from(value: Arc<T>) -> Self {
        Self::Single(value)
    }
}

impl<T> From<Vec<Arc<T>>> for Payload<T> {
    fn from(values: Vec<Arc<T>>) -> Self {
        Self::Sequence(values)
    }
}

impl<T> From<&[Arc<T>]> for Payload<T> {
    fn from(values: &[Arc<T>]) -> Self {
        Self::Indexed(values.to_vec().into_boxed_slice())
    }
}

impl<T, const N: usize> From<[Arc<T>; N]> for Payload<T> {
    fn from(values: [Arc<T>; N]) -> Self {
        Self::Indexed(Box::new(values))
    }
}

// =============================================================================
// Envelope - The FilterSpec-bearing wrapper
// =============================================================================

/// Wrapper shaping a value's serialized representation.
///
/// The envelope disappears from output: rendering it emits the wrapped
/// value's (filtered) fields directly in the envelope's position, plus any
/// permitted expansion entries. The wrapped value is left untouched, so
/// the same shared instance can be wrapped with different rules by
/// different callers at the same time.
///
/// The rule mutators are forwarded from [`FilterSpec`] and chain:
///
/// ```rust
/// use reshape::Envelope;
///
/// let mut envelope = Envelope::of(42u32);
/// envelope.exclude("internal_id").expand("kind", "answer");
/// ```
#[derive(Debug)]
pub struct Envelope<T> {
    payload: Payload<T>,
    spec: FilterSpec,
}

// Cloning shares the payload allocations and copies the rule sets; no
// `T: Clone` is required.
impl<T> Clone for Envelope<T> {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            spec: self.spec.clone(),
        }
    }
}

impl<T> Envelope<T> {
    /// Wraps a shared value, or a sequence or array of shared values.
    pub fn new(payload: impl Into<Payload<T>>) -> Self {
        Self {
            payload: payload.into(),
            spec: FilterSpec::new(),
        }
    }

    /// Wraps an owned value, sharing it on the way in.
    pub fn of(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Collapses a wrapper-of-a-wrapper into one envelope.
    ///
    /// The engine resolves each filtering phase at most once per real
    /// value, so envelopes never nest: the new envelope adopts the inner
    /// payload (the same shared allocations, so identity is preserved) and
    /// deep-copies the inner rule sets. The copies are independent;
    /// mutating either envelope afterwards does not affect the other.
    #[must_use]
    pub fn collapse(inner: &Envelope<T>) -> Self {
        Self {
            payload: inner.payload.clone(),
            spec: inner.spec.clone(),
        }
    }

    /// The wrapped value(s).
    #[must_use]
    pub fn payload(&self) -> &Payload<T> {
        &self.payload
    }

    /// The decision set shaping this envelope's output.
    #[must_use]
    pub fn filter_spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Mutable access to the decision set.
    pub fn filter_spec_mut(&mut self) -> &mut FilterSpec {
        &mut self.spec
    }

    /// Adds `name` to the allowed set. See [`FilterSpec::allow`].
    pub fn allow(&mut self, name: impl Into<String>) -> &mut Self {
        self.spec.allow(name);
        self
    }

    /// Adds every name in `names` to the allowed set.
    pub fn allow_all<I>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.spec.allow_all(names);
        self
    }

    /// Adds `name` to the excluded set. See [`FilterSpec::exclude`].
    pub fn exclude(&mut self, name: impl Into<String>) -> &mut Self {
        self.spec.exclude(name);
        self
    }

    /// Adds every name in `names` to the excluded set.
    pub fn exclude_all<I>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.spec.exclude_all(names);
        self
    }

    /// Adds a synthetic attribute. See [`FilterSpec::expand`].
    pub fn expand(&mut self, name: impl Into<String>, data: impl Into<Value>) -> &mut Self {
        self.spec.expand(name, data);
        self
    }

    /// Masks a natural field. See [`FilterSpec::replace`].
    pub fn replace(&mut self, name: impl Into<String>, data: impl Into<Value>) -> &mut Self {
        self.spec.replace(name, data);
        self
    }
}

impl<T> Envelope<T>
where
    T: Send + Sync + 'static,
{
    /// Engine-facing view for envelope-level resolution.
    pub(crate) fn view(&self) -> EnvelopeView<'_> {
        EnvelopeView::new(&self.spec, self.payload.shape())
    }
}

impl<T> From<&Envelope<T>> for Envelope<T> {
    fn from(inner: &Envelope<T>) -> Self {
        Self::collapse(inner)
    }
}

// =============================================================================
// Tests
// =============================================================================
