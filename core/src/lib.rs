//! treema - backtracking pattern matching and structural editing for
//! JSON-like trees
//!
//! Patterns match anchored at a value (or search every subtree), enumerate
//! *all* solutions through exhaustive backtracking, and record enough path
//! metadata per binding that solutions can drive precise structural edits on
//! a fresh copy of the input.
//!
//! # Architecture
//!
//! - [`Value`] — the JSON-like tree: scalars, sequences, ordered mappings
//! - [`Pattern`] — the compiled AST; [`PatternSpec`] is its declarative,
//!   serde-ready description
//! - [`Matcher`] — a validated pattern plus resource options, streaming
//!   [`Solution`]s lazily
//! - [`Solution`] / [`Binding`] — immutable snapshots carrying value, site,
//!   and source path
//! - [`Edits`] / [`apply_edits`] — replay bindings as deepest-first edits on
//!   one fresh copy
//!
//! # Key Design Insights
//!
//! 1. **Unification**: every later occurrence of a bound variable must be
//!    structurally equal to the stored value; scalar and group bindings
//!    never mix under one name.
//!
//! 2. **Branch isolation**: environments fork on every bind, so sibling
//!    alternatives never observe each other's bindings and no rollback
//!    machinery exists to get wrong.
//!
//! 3. **Mismatch is silence**: a pattern that does not fit yields zero
//!    solutions. Errors are reserved for usage faults (caught at
//!    construction) and resource faults (depth, steps, time).
//!
//! # Example
//!
//! ```
//! use treema::prelude::*;
//!
//! // [$cmd, $args..] — first element bound, tail captured as a group.
//! let matcher = Matcher::new(Pattern::seq([
//!     Pattern::var("cmd"),
//!     Pattern::group_var("args"),
//! ]))?;
//!
//! let call = Value::seq([Value::from("push"), Value::from(1), Value::from(2)]);
//! let solution = matcher.first(&call)?.expect("anchored match");
//! assert_eq!(solution.get("cmd"), Some(&Value::from("push")));
//! assert_eq!(
//!     solution.get("args"),
//!     Some(&Value::seq([Value::from(1), Value::from(2)]))
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - `serde` — `Serialize`/`Deserialize` for [`Value`] and [`PatternSpec`]
//! - `json` — conversions to and from `serde_json::Value`
//! - `tracing` — trace-level search events via the `tracing` crate

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod clauses;
mod edit;
mod engine;
mod env;
mod find;
mod pattern;
mod pattern_spec;
mod sequence;
mod value;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Values and paths
pub use value::{render_path, PathStep, Value};

// Pattern AST
pub use pattern::{Clause, CountRange, ObjectPattern, Pattern, RepeatMode, Residual, Step};

// Declarative pattern descriptions
pub use pattern_spec::{
    ClauseSpec, CountSpec, PatternSpec, RepeatModeSpec, ResidualSpec, StepSpec,
};

// Matching
pub use engine::{MatchOptions, Matcher};
pub use env::{Binding, Site, Solution};
pub use find::Found;

// Editing
pub use edit::{apply_edits, Edits};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use treema::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Editing
        apply_edits,
        // Solutions
        Binding,
        // Pattern AST
        Clause,
        CountRange,
        // Errors
        EditError,
        Edits,
        Found,
        MatchError,
        MatchOptions,
        // Matching
        Matcher,
        ObjectPattern,
        Pattern,
        PatternError,
        // Declarative layer
        PatternSpec,
        // Values
        PathStep,
        RepeatMode,
        Residual,
        Site,
        Solution,
        Step,
        Value,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum allowed nesting for a pattern AST.
///
/// This limit protects against stack overflow from deeply nested patterns.
/// Checked by [`Pattern::validate`], which [`Matcher::new`] runs eagerly.
pub const MAX_PATTERN_DEPTH: usize = 64;

/// Default cap on input nesting per match attempt.
///
/// Input deeper than the cap is rejected upfront with
/// [`MatchError::DepthExceeded`]; raise it per attempt through
/// [`MatchOptions::max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Maximum length for regex patterns.
///
/// Compilation cost grows with pattern length even though the `regex` crate
/// guarantees linear-time matching.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from pattern construction and validation.
///
/// These are usage errors, caught when the pattern is built or validated and
/// never during matching. Fix the pattern and reconstruct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// Pattern nesting exceeds [`MAX_PATTERN_DEPTH`].
    #[error("pattern nesting depth is {depth}, but maximum allowed is {max}")]
    DepthExceeded {
        /// Depth at which validation stopped.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },
    /// A regex failed to compile.
    #[error("invalid regex \"{pattern}\": {message}")]
    InvalidRegex {
        /// The regex source that failed.
        pattern: String,
        /// The underlying error message.
        message: String,
    },
    /// A regex source exceeds [`MAX_REGEX_PATTERN_LENGTH`].
    #[error("regex length is {len}, but maximum allowed is {max}")]
    RegexTooLong {
        /// Actual length of the source.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// One name is bound as a scalar in one place and as a group in another.
    #[error("variable \"{name}\" is used as both a scalar and a group")]
    MixedKinds {
        /// The conflicted variable name.
        name: String,
    },
    /// A repetition range whose maximum lies below its minimum.
    #[error("repetition range {{{min},{max}}} is inverted")]
    InvalidCount {
        /// Lower bound.
        min: usize,
        /// Upper bound, which is below `min`.
        max: usize,
    },
    /// Repetition placed where it cannot consume sequence elements.
    #[error("repetition is only meaningful as a sequence item")]
    RepeatOutsideSequence,
}

/// Resource errors that abort a whole match or find attempt.
///
/// Structural mismatch is never an error; it is an empty solution sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// Input nesting beyond the configured limit. Cyclic input, in data
    /// models that can express one, surfaces the same way.
    #[error("input at {path} is nested beyond the depth limit of {max}")]
    DepthExceeded {
        /// Path of the first offending position.
        path: String,
        /// The limit in force.
        max: usize,
    },
    /// The step budget ran out mid-search.
    #[error("search budget of {budget} steps exhausted at {path} while matching {pattern}")]
    BudgetExceeded {
        /// Traversal path when the attempt aborted.
        path: String,
        /// The pattern position last reached.
        pattern: String,
        /// The budget that was exceeded.
        budget: u64,
    },
    /// The wall-clock budget ran out mid-search.
    #[error("search time budget of {budget:?} exhausted at {path} while matching {pattern}")]
    DeadlineExceeded {
        /// Traversal path when the attempt aborted.
        path: String,
        /// The pattern position last reached.
        pattern: String,
        /// The budget that was exceeded.
        budget: std::time::Duration,
    },
}

/// Errors from [`apply_edits`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// An instruction names a variable no solution binds.
    #[error("edit instruction targets \"{name}\", which no solution binds")]
    UnboundName {
        /// The unbound variable name.
        name: String,
    },
    /// A key-site replacement was not a string.
    #[error("renaming the key bound by \"{name}\" requires a string, got {got}")]
    KeyRenameNotString {
        /// The instruction's variable name.
        name: String,
        /// Type name of the offending replacement.
        got: &'static str,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tracing shim
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "tracing")]
macro_rules! trace_search {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_search {
    ($($arg:tt)*) => {};
}

pub(crate) use trace_search;
