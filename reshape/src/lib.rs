//! Runtime shaping of serialized JSON output.
//!
//! This crate separates:
//! - **Decision sets**: which attribute names of a value are visible in
//!   output, which are replaced, and which synthetic attributes are added
//!   ([`FilterSpec`]).
//! - **Resolution**: recovering the right decision set for each value as the
//!   serializer renders it, even when the same shared instance is being
//!   serialized concurrently by callers with different rules
//!   ([`FilterRegistry`]).
//!
//! A value is wrapped in an [`Envelope`] at the serialization boundary and
//! the rules are configured on the envelope. The wrapped value itself is
//! never touched: shaping happens entirely at render time, so the same
//! instance can be serialized with different rules by different callers.
//!
//! What this crate does:
//! - filters a value's fields by name (allow/exclude, exclusion wins)
//! - replaces the value of an existing field without mutating the value
//! - adds synthetic (expansion) fields to the output
//! - isolates concurrent serialization calls from each other's rules
//!
//! What it does not do:
//! - walk an unknown object graph: a nested value that needs its own
//!   shaping must be wrapped in its own [`Envelope`] by the caller
//! - perform I/O or define a wire protocol
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use reshape::Envelope;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     username: String,
//!     password: String,
//! }
//!
//! let user = Arc::new(User {
//!     username: "Bob".into(),
//!     password: "pw".into(),
//! });
//!
//! let mut envelope = Envelope::new(user.clone());
//! envelope.exclude("password");
//! let shaped = reshape::to_value(&envelope).unwrap();
//! assert_eq!(shaped, serde_json::json!({"username": "Bob"}));
//!
//! // The same instance, shaped differently elsewhere.
//! let mut envelope = Envelope::new(user);
//! envelope.expand("role", "admin");
//! let shaped = reshape::to_value(&envelope).unwrap();
//! assert_eq!(
//!     shaped,
//!     serde_json::json!({"username": "Bob", "password": "pw", "role": "admin"})
//! );
//! ```

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::cargo_common_metadata
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Module declarations
mod envelope;
pub mod filter;
mod ser;

// Re-exports from the envelope module
pub use envelope::{Envelope, Payload};
// Re-exports from the filter module
pub use filter::{
    CallContext, CallScope, ContextId, ENVELOPE_FILTER_ID, EnvelopeView, FilterError,
    FilterRegistry, FilterSpec, FilterTarget, NameFilter, PayloadShape, VALUE_FILTER_ID,
    ValueIdentity,
};
// Re-exports from the serde adapter
pub use ser::{to_string, to_string_pretty, to_value, to_vec};
