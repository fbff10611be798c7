//! Per-value filtering decision sets.
//!
//! A [`FilterSpec`] records how one wrapped value's serialized
//! representation is shaped:
//!
//! - **allowed**: names explicitly allowed; absent means every name is
//!   implicitly allowed
//! - **excluded**: names explicitly excluded; absent means no name is
//!   excluded
//! - **replaced**: expansion entries that mask an existing field rather
//!   than add a new one
//! - **expansions**: synthetic `name -> value` entries merged into output
//!   alongside the value's natural fields
//!
//! The visibility predicate is pure set logic: a name is visible iff it is
//! allowed (or no allowed set exists) and not excluded. Declaring a name
//! both allowed and excluded is legal; exclusion wins.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

// =============================================================================
// FilterSpec - The per-value decision set
// =============================================================================

/// Decision set shaping one wrapped value's serialized representation.
///
/// Owned by the [`Envelope`](crate::Envelope) that created it and snapshotted
/// into the [`FilterRegistry`](super::FilterRegistry) when serialization
/// begins. All sets are created lazily on first use; an untouched spec
/// filters nothing.
///
/// Expansion and replacement entries are subject to the same visibility
/// predicate as natural fields: replacing an excluded name still emits
/// nothing under that name. Replacing a name the wrapped value does not
/// have behaves exactly like [`expand`](Self::expand).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    allowed: Option<BTreeSet<String>>,
    excluded: Option<BTreeSet<String>>,
    replaced: Option<BTreeSet<String>>,
    expansions: Option<BTreeMap<String, Value>>,
}

impl FilterSpec {
    /// Creates a spec with no rules; every name is visible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` to the allowed set, creating the set on first use.
    ///
    /// Once an allowed set exists, only its members are visible. A name may
    /// still be suppressed by [`exclude`](Self::exclude).
    pub fn allow(&mut self, name: impl Into<String>) -> &mut Self {
        self.allowed
            .get_or_insert_with(BTreeSet::new)
            .insert(name.into());
        self
    }

    /// Adds every name in `names` to the allowed set.
    pub fn allow_all<I>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.allowed
            .get_or_insert_with(BTreeSet::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds `name` to the excluded set, creating the set on first use.
    pub fn exclude(&mut self, name: impl Into<String>) -> &mut Self {
        self.excluded
            .get_or_insert_with(BTreeSet::new)
            .insert(name.into());
        self
    }

    /// Adds every name in `names` to the excluded set.
    pub fn exclude_all<I>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.excluded
            .get_or_insert_with(BTreeSet::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds `data` as a synthetic attribute under `name`, rendered as if it
    /// were a field of the wrapped value.
    ///
    /// Expanding the same name twice overwrites the earlier entry. The
    /// allow/exclude rules still apply at render time.
    pub fn expand(&mut self, name: impl Into<String>, data: impl Into<Value>) -> &mut Self {
        self.expansions
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), data.into());
        self
    }

    /// Masks the natural field `name` with `data`.
    ///
    /// The natural value is suppressed from output and only the replacement
    /// is emitted under that name. The allow/exclude rules still apply: a
    /// replaced-but-excluded name emits nothing at all.
    pub fn replace(&mut self, name: impl Into<String>, data: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.replaced
            .get_or_insert_with(BTreeSet::new)
            .insert(name.clone());
        self.expand(name, data)
    }

    /// Returns true iff `name` is visible in output.
    ///
    /// Visible means: no allowed set exists or it contains `name`, and no
    /// excluded set exists or it does not contain `name`.
    #[must_use]
    pub fn is_permitted(&self, name: &str) -> bool {
        self.allowed.as_ref().is_none_or(|allowed| allowed.contains(name))
            && self
                .excluded
                .as_ref()
                .is_none_or(|excluded| !excluded.contains(name))
    }

    /// Returns true iff `name` has been replaced.
    ///
    /// Independent of the allow/exclude logic; see
    /// [`is_permitted`](Self::is_permitted).
    #[must_use]
    pub fn is_replaced(&self, name: &str) -> bool {
        self.replaced
            .as_ref()
            .is_some_and(|replaced| replaced.contains(name))
    }

    /// Iterates the expansion entries that are currently permitted.
    ///
    /// Entries suppressed by the allow/exclude rules are filtered out at
    /// read time; the underlying map is not modified.
    pub fn expansion_entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.expansions
            .iter()
            .flat_map(BTreeMap::iter)
            .filter(|(name, _)| self.is_permitted(name.as_str()))
            .map(|(name, value)| (name.as_str(), value))
    }

    /// The explicitly allowed names, if an allowed set exists.
    #[must_use]
    pub fn allowed_names(&self) -> Option<&BTreeSet<String>> {
        self.allowed.as_ref()
    }

    /// The explicitly excluded names, if an excluded set exists.
    #[must_use]
    pub fn excluded_names(&self) -> Option<&BTreeSet<String>> {
        self.excluded.as_ref()
    }

    /// The replaced names, if any replacement was made.
    #[must_use]
    pub fn replaced_names(&self) -> Option<&BTreeSet<String>> {
        self.replaced.as_ref()
    }
}

// =============================================================================
// Tests
// =============================================================================
