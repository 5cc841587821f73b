//! treema-test: YAML conformance fixtures for the treema engine.
//!
//! A [`Fixture`] bundles one pattern with input cases and their expected
//! outcomes: solution maps, counts, occurrence paths, edited output, or a
//! resource error. The conformance suite under `fixtures/` is run by
//! `tests/conformance.rs`; the same runner is usable from any crate's tests.
//!
//! # Example
//!
//! ```
//! use treema_test::prelude::*;
//!
//! let fixture = Fixture::from_yaml(r#"
//! name: command shape
//! pattern:
//!   type: seq
//!   items:
//!     - { type: literal, value: set }
//!     - { type: var, name: key }
//!     - { type: var, name: value }
//! cases:
//!   - name: a set command binds key and value
//!     input: [set, color, red]
//!     solutions:
//!       - { key: color, value: red }
//!   - name: other commands do not match
//!     input: [get, color]
//!     count: 0
//! "#).unwrap();
//!
//! fixture.run_and_assert();
//! ```

pub mod fixture;

pub use fixture::{CaseResult, EditSpec, ErrorKind, Fixture, OptionsSpec, TestCase};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fixture::{CaseResult, EditSpec, ErrorKind, Fixture, OptionsSpec, TestCase};
    pub use treema::prelude::*;
}
