//! serde adapter: binds the filtering decision layer into the engine.
//!
//! Rendering an [`Envelope`] runs the two resolution phases against the
//! process-wide [`FilterRegistry`]:
//!
//! 1. **envelope level** — registers each wrapped value identity with a
//!    snapshot of the envelope's rules and emits no filtering (the envelope
//!    already exposes exactly the wrapped value);
//! 2. **value level** — consumes the registration for the value being
//!    rendered, filters its natural fields by name, then merges the
//!    permitted expansion entries.
//!
//! Phase ordering is structural: the envelope is always resolved before the
//! adapter descends into its values. A value-level resolution without a
//! matching registration aborts the serialization call as a serde error;
//! shaped output is never silently unfiltered.

use std::sync::Arc;

use serde::ser::{Error as _, Serialize, SerializeSeq, Serializer};
use serde_json::{Map, Value};

use crate::envelope::{Envelope, Payload};
use crate::filter::{
    CallContext, CallScope, ENVELOPE_FILTER_ID, FilterError, FilterRegistry, FilterTarget,
    NameFilter, VALUE_FILTER_ID, ValueIdentity,
};

impl<T> Serialize for Envelope<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Joining keeps a nested envelope inside the caller's call; a fresh
        // top-level call gets its own context for the whole subtree.
        let scope = CallScope::enter_or_join();
        let registry = FilterRegistry::global();

        registry
            .resolve(
                scope.context(),
                ENVELOPE_FILTER_ID,
                FilterTarget::Envelope(self.view()),
            )
            .map_err(S::Error::custom)?;

        match self.payload() {
            Payload::Single(value) => shape_value(scope.context(), registry, value, serializer),
            payload @ (Payload::Sequence(_) | Payload::Indexed(_)) => {
                let mut seq = serializer.serialize_seq(Some(payload.len()))?;
                for value in payload.values() {
                    seq.serialize_element(&ShapedElement {
                        context: scope.context(),
                        value,
                    })?;
                }
                seq.end()
            }
        }
    }
}

/// One element of a collection payload; value-phase resolved on its own.
struct ShapedElement<'a, T> {
    context: &'a CallContext,
    value: &'a Arc<T>,
}

impl<T> Serialize for ShapedElement<'_, T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        shape_value(self.context, FilterRegistry::global(), self.value, serializer)
    }
}

/// Renders one wrapped value under its resolved rules.
fn shape_value<T, S>(
    context: &CallContext,
    registry: &FilterRegistry,
    value: &Arc<T>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    T: Serialize + Send + Sync + 'static,
    S: Serializer,
{
    let resolved = registry
        .resolve(
            context,
            VALUE_FILTER_ID,
            FilterTarget::Value(ValueIdentity::of(value)),
        )
        .map_err(S::Error::custom)?;

    // The value phase never resolves to "no filtering": emitting the raw
    // value here would silently drop the caller's rules.
    let Some(filter) = resolved else {
        return Err(S::Error::custom(FilterError::Correlation {
            context: context.id(),
        }));
    };

    let tree = serde_json::to_value(&**value).map_err(S::Error::custom)?;
    apply_filter(tree, &filter).serialize(serializer)
}

/// Applies the name predicate to the engine's view of the value.
///
/// A value that renders as a non-object has no names to filter and passes
/// through; expansion entries have no position to merge into and are
/// skipped.
fn apply_filter(tree: Value, filter: &NameFilter) -> Value {
    let Value::Object(fields) = tree else {
        return tree;
    };
    let mut shaped = Map::new();
    for (name, field) in fields {
        if filter.includes(&name) {
            shaped.insert(name, field);
        }
    }
    for (name, expansion) in filter.expansion_entries() {
        // An expansion under a still-visible natural name wins; `replace`
        // is the explicit form of that collision.
        shaped.insert(name.to_owned(), expansion.clone());
    }
    Value::Object(shaped)
}

// =============================================================================
// Entry points
// =============================================================================

/// Shapes `envelope` into a JSON tree.
pub fn to_value<T>(envelope: &Envelope<T>) -> Result<Value, serde_json::Error>
where
    T: Serialize + Send + Sync + 'static,
{
    serde_json::to_value(envelope)
}

/// Shapes `envelope` into a JSON string.
pub fn to_string<T>(envelope: &Envelope<T>) -> Result<String, serde_json::Error>
where
    T: Serialize + Send + Sync + 'static,
{
    serde_json::to_string(envelope)
}

/// Shapes `envelope` into a pretty-printed JSON string.
pub fn to_string_pretty<T>(envelope: &Envelope<T>) -> Result<String, serde_json::Error>
where
    T: Serialize + Send + Sync + 'static,
{
    serde_json::to_string_pretty(envelope)
}

/// Shapes `envelope` into a JSON byte vector.
pub fn to_vec<T>(envelope: &Envelope<T>) -> Result<Vec<u8>, serde_json::Error>
where
    T: Serialize + Send + Sync + 'static,
{
    serde_json::to_vec(envelope)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::apply_filter;
    use crate::filter::{
        CallContext, ENVELOPE_FILTER_ID, EnvelopeView, FilterRegistry, FilterSpec, FilterTarget,
        PayloadShape, VALUE_FILTER_ID, ValueIdentity,
    };

    fn resolve_filter(spec: &FilterSpec) -> crate::filter::NameFilter {
        let registry = FilterRegistry::new();
        let context = CallContext::fresh();
        let value = std::sync::Arc::new(0u32);
        let view = EnvelopeView::new(spec, PayloadShape::Scalar(ValueIdentity::of(&value)));
        registry
            .resolve(&context, ENVELOPE_FILTER_ID, FilterTarget::Envelope(view))
            .unwrap();
        registry
            .resolve(
                &context,
                VALUE_FILTER_ID,
                FilterTarget::Value(ValueIdentity::of(&value)),
            )
            .unwrap()
            .expect("registered value resolves")
    }

    #[test]
    fn filters_object_fields_by_name() {
        let mut spec = FilterSpec::new();
        spec.exclude("password");
        let filter = resolve_filter(&spec);
        let shaped = apply_filter(json!({"username": "Bob", "password": "pw"}), &filter);
        assert_eq!(shaped, json!({"username": "Bob"}));
    }

    #[test]
    fn merges_permitted_expansions() {
        let mut spec = FilterSpec::new();
        spec.expand("role", "admin");
        let filter = resolve_filter(&spec);
        let shaped = apply_filter(json!({"username": "Bob"}), &filter);
        assert_eq!(shaped, json!({"username": "Bob", "role": "admin"}));
    }

    #[test]
    fn replacement_suppresses_the_natural_value() {
        let mut spec = FilterSpec::new();
        spec.replace("password", "***");
        let filter = resolve_filter(&spec);
        let shaped = apply_filter(json!({"username": "Bob", "password": "pw"}), &filter);
        assert_eq!(shaped, json!({"username": "Bob", "password": "***"}));
    }

    #[test]
    fn non_objects_pass_through_unchanged() {
        let mut spec = FilterSpec::new();
        spec.exclude("anything").expand("role", "admin");
        let filter = resolve_filter(&spec);
        assert_eq!(apply_filter(json!("plain"), &filter), json!("plain"));
        assert_eq!(apply_filter(json!([1, 2]), &filter), json!([1, 2]));
    }
}
