//! Driving the resolution surface directly, the way a custom engine would.
//!
//! These tests verify:
//! - correlation failures are raised, never silently unfiltered output
//! - scope guards release a call's registrations on exit
//! - the legacy single-identifier lookup stays rejected

use std::sync::Arc;

use reshape::{
    CallContext, CallScope, ENVELOPE_FILTER_ID, EnvelopeView, FilterError, FilterRegistry,
    FilterSpec, FilterTarget, PayloadShape, VALUE_FILTER_ID, ValueIdentity,
};

mod correlation {
    use super::*;

    #[test]
    fn value_phase_without_envelope_phase_is_fatal() {
        let registry = FilterRegistry::new();
        let context = CallContext::fresh();
        let value = Arc::new(String::from("never wrapped"));

        let result = registry.resolve(
            &context,
            VALUE_FILTER_ID,
            FilterTarget::Value(ValueIdentity::of(&value)),
        );
        assert!(matches!(result, Err(FilterError::Correlation { .. })));
    }

    #[test]
    fn correlation_errors_identify_the_calling_context() {
        let registry = FilterRegistry::new();
        let context = CallContext::fresh();
        let value = Arc::new(0u32);

        let error = registry
            .resolve(
                &context,
                VALUE_FILTER_ID,
                FilterTarget::Value(ValueIdentity::of(&value)),
            )
            .unwrap_err();
        assert!(error.to_string().contains(&context.id().to_string()));
    }

    #[test]
    fn registrations_do_not_cross_registries() {
        let context = CallContext::fresh();
        let value = Arc::new(0u32);
        let mut spec = FilterSpec::new();
        spec.exclude("secret");

        let first = FilterRegistry::new();
        let view = EnvelopeView::new(&spec, PayloadShape::Scalar(ValueIdentity::of(&value)));
        first
            .resolve(&context, ENVELOPE_FILTER_ID, FilterTarget::Envelope(view))
            .unwrap();

        let second = FilterRegistry::new();
        let result = second.resolve(
            &context,
            VALUE_FILTER_ID,
            FilterTarget::Value(ValueIdentity::of(&value)),
        );
        assert!(matches!(result, Err(FilterError::Correlation { .. })));
    }
}

mod scopes {
    use super::*;

    #[test]
    fn a_finished_scope_releases_its_registrations() {
        let registry = FilterRegistry::global();
        let value = Arc::new(String::from("wrapped"));
        let spec = FilterSpec::new();

        let scope = CallScope::enter();
        let context = scope.context().clone();
        let view = EnvelopeView::new(&spec, PayloadShape::Scalar(ValueIdentity::of(&value)));
        registry
            .resolve(&context, ENVELOPE_FILTER_ID, FilterTarget::Envelope(view))
            .unwrap();
        drop(scope);

        let result = registry.resolve(
            &context,
            VALUE_FILTER_ID,
            FilterTarget::Value(ValueIdentity::of(&value)),
        );
        assert!(matches!(result, Err(FilterError::Correlation { .. })));
    }

    #[test]
    fn an_open_scope_resolves_normally() {
        let registry = FilterRegistry::global();
        let value = Arc::new(String::from("wrapped"));
        let mut spec = FilterSpec::new();
        spec.allow("visible");

        let scope = CallScope::enter();
        let view = EnvelopeView::new(&spec, PayloadShape::Scalar(ValueIdentity::of(&value)));
        registry
            .resolve(scope.context(), ENVELOPE_FILTER_ID, FilterTarget::Envelope(view))
            .unwrap();

        let filter = registry
            .resolve(
                scope.context(),
                VALUE_FILTER_ID,
                FilterTarget::Value(ValueIdentity::of(&value)),
            )
            .unwrap()
            .expect("registered value resolves");
        assert!(filter.includes("visible"));
        assert!(!filter.includes("hidden"));
    }
}

mod legacy {
    use super::*;

    #[test]
    fn single_identifier_lookup_always_fails() {
        let registry = FilterRegistry::new();
        for filter_id in [ENVELOPE_FILTER_ID, VALUE_FILTER_ID, "anything"] {
            assert!(matches!(
                registry.resolve_by_id(filter_id),
                Err(FilterError::LegacyLookup)
            ));
        }
    }
}

mod pass_through {
    use super::*;

    #[test]
    fn foreign_filter_ids_resolve_to_no_filtering() {
        let registry = FilterRegistry::new();
        let context = CallContext::fresh();
        let value = Arc::new(0u32);
        let spec = FilterSpec::new();

        let view = EnvelopeView::new(&spec, PayloadShape::Scalar(ValueIdentity::of(&value)));
        let resolved = registry
            .resolve(&context, "other-library/filter", FilterTarget::Envelope(view))
            .unwrap();
        assert!(resolved.is_none());
    }
}
