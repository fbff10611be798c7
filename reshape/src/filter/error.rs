//! Resolution failures.

use thiserror::Error;

use super::scope::ContextId;

/// Failure raised by [`FilterRegistry::resolve`](super::FilterRegistry::resolve).
///
/// None of these are transient: resolution is a pure in-memory lookup, and
/// retrying cannot succeed. A correlation failure means the engine invoked
/// the two phases out of their documented order for some value, which is an
/// integration bug in the calling code, not a runtime condition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// Value-level resolution ran without a matching envelope-level
    /// registration for the value in this context.
    ///
    /// The serialization call carrying it must abort; shaped output is
    /// never silently unfiltered.
    #[error(
        "no filter rules registered for the value being rendered (context {context}); \
         envelope-level resolution did not run for this value in this call"
    )]
    Correlation {
        /// The serialization call that failed to correlate.
        context: ContextId,
    },

    /// The single-identifier lookup predates two-phase resolution and is
    /// kept only to satisfy older engine interfaces.
    #[error(
        "single-identifier filter lookup is unsupported; \
         resolve with a phase identifier and a target value"
    )]
    LegacyLookup,
}

#[cfg(test)]
mod tests {
    use super::FilterError;
    use crate::filter::CallContext;

    #[test]
    fn correlation_message_names_the_context() {
        let context = CallContext::fresh();
        let error = FilterError::Correlation {
            context: context.id(),
        };
        let message = error.to_string();
        assert!(message.contains(&context.id().to_string()));
        assert!(message.contains("no filter rules registered"));
    }
}
