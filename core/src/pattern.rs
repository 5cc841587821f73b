//! `Pattern` — the AST the engine matches against a [`Value`] tree.
//!
//! Patterns form a closed sum type. Constructors on [`Pattern`] are the
//! surface an upstream parser (or test code) targets; they do light
//! per-node checking (regex compilation, length caps) and return
//! [`PatternError`](crate::PatternError) where construction can fail.
//! Whole-AST usage rules are enforced by [`Pattern::validate`], which runs
//! before any matching: a name may not be used as both a scalar and a group,
//! repetition ranges must be ordered, and repetition is only meaningful as a
//! sequence item.
//!
//! # Example
//!
//! ```
//! use treema::{CountRange, Pattern};
//!
//! // ["start", rest..] with the rest captured as a group
//! let pattern = Pattern::seq([
//!     Pattern::literal("start"),
//!     Pattern::bind_group("tail", Pattern::rest()),
//! ]);
//! assert!(pattern.validate().is_ok());
//!
//! // the same name cannot be both scalar and group
//! let bad = Pattern::seq([Pattern::var("x"), Pattern::group_var("x")]);
//! assert!(bad.validate().is_err());
//! ```

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::value::Value;
use crate::{PatternError, MAX_PATTERN_DEPTH, MAX_REGEX_PATTERN_LENGTH};

/// How many times a repeated sequence item may match.
///
/// `max = None` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountRange {
    /// Minimum number of repetitions.
    pub min: usize,
    /// Maximum number of repetitions; `None` is unbounded.
    pub max: Option<usize>,
}

impl CountRange {
    /// Exactly `n` repetitions.
    #[must_use]
    pub fn exactly(n: usize) -> Self {
        CountRange { min: n, max: Some(n) }
    }

    /// At least `n` repetitions, unbounded above.
    #[must_use]
    pub fn at_least(n: usize) -> Self {
        CountRange { min: n, max: None }
    }

    /// Between `min` and `max` repetitions, inclusive.
    #[must_use]
    pub fn between(min: usize, max: usize) -> Self {
        CountRange { min, max: Some(max) }
    }

    /// Zero or more repetitions.
    #[must_use]
    pub fn any() -> Self {
        CountRange { min: 0, max: None }
    }

    /// Whether `n` lies in the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|m| n <= m)
    }

    fn ordered(&self) -> bool {
        self.max.is_none_or(|m| m >= self.min)
    }
}

impl fmt::Display for CountRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(m) if m == self.min => write!(f, "{{{}}}", self.min),
            Some(m) => write!(f, "{{{},{}}}", self.min, m),
            None => write!(f, "{{{},}}", self.min),
        }
    }
}

/// Enumeration order for repetition take-counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Longest take first, backtracking downward.
    #[default]
    Greedy,
    /// Shortest take first, backtracking upward.
    Lazy,
    /// The largest viable take only; never retries another count.
    Possessive,
}

/// One breadcrumb step descending from a clause's pair value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Descend into this mapping key.
    Key(String),
    /// Descend into this sequence index.
    Index(usize),
    /// Descend through a previously bound variable: a string binding is used
    /// as a key, an integral number as an index.
    Var(String),
}

impl Step {
    /// A literal key step.
    pub fn key(key: impl Into<String>) -> Self {
        Step::Key(key.into())
    }

    /// A literal index step.
    #[must_use]
    pub fn index(index: usize) -> Self {
        Step::Index(index)
    }

    /// A step resolved from an already-bound variable.
    pub fn var(name: impl Into<String>) -> Self {
        Step::Var(name.into())
    }
}

/// One clause of an object pattern.
///
/// A clause selects its *candidate keys* (every key satisfying `key`), checks
/// its cardinality against the whole candidate set, then branches over the
/// candidates as witnesses: breadcrumb `steps` descend from the chosen pair's
/// value and `value` must match at the final position. With `universal` set,
/// every candidate's value must satisfy `value`, not just the witness.
#[derive(Clone, Debug)]
pub struct Clause {
    /// Pattern over the key string.
    pub key: Pattern,
    /// Breadcrumb steps descending from the pair's value.
    pub steps: Vec<Step>,
    /// Pattern over the value at the final breadcrumb position.
    pub value: Pattern,
    /// Constraint on the candidate-set size. `None` defaults to "at least
    /// one" unless the clause is `optional`.
    pub count: Option<CountRange>,
    /// Require every candidate's value to match, not just one witness.
    pub universal: bool,
    /// Allow an empty candidate set when no explicit `count` is given.
    pub optional: bool,
}

impl Clause {
    /// A clause over the given key pattern, matching any value.
    #[must_use]
    pub fn new(key: Pattern) -> Self {
        Clause {
            key,
            steps: Vec::new(),
            value: Pattern::Wildcard,
            count: None,
            universal: false,
            optional: false,
        }
    }

    /// Appends a breadcrumb step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets the value pattern.
    #[must_use]
    pub fn value(mut self, value: Pattern) -> Self {
        self.value = value;
        self
    }

    /// Sets an explicit candidate-count constraint.
    #[must_use]
    pub fn count(mut self, count: CountRange) -> Self {
        self.count = Some(count);
        self
    }

    /// Requires all candidates (not just the witness) to satisfy the value
    /// pattern.
    #[must_use]
    pub fn universal(mut self) -> Self {
        self.universal = true;
        self
    }

    /// Permits an empty candidate set.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Constraint and binder for the pairs no clause touched.
#[derive(Clone, Debug, Default)]
pub struct Residual {
    /// Constraint on how many pairs may remain untouched.
    pub count: Option<CountRange>,
    /// Bind the untouched pairs as a group under this name.
    pub bind: Option<String>,
}

impl Residual {
    /// An unconstrained, unbound residual.
    #[must_use]
    pub fn new() -> Self {
        Residual::default()
    }

    /// Constrains the residual size.
    #[must_use]
    pub fn count(mut self, count: CountRange) -> Self {
        self.count = Some(count);
        self
    }

    /// Binds the residual pairs as a group.
    pub fn bind(mut self, name: impl Into<String>) -> Self {
        self.bind = Some(name.into());
        self
    }
}

/// A pattern over a mapping: independent clauses plus an optional residual.
#[derive(Clone, Debug, Default)]
pub struct ObjectPattern {
    /// Clauses, matched first to last. Clauses may touch overlapping keys.
    pub clauses: Vec<Clause>,
    /// Constraint/binder for untouched pairs.
    pub residual: Option<Residual>,
}

impl ObjectPattern {
    /// An object pattern with no clauses yet.
    #[must_use]
    pub fn new() -> Self {
        ObjectPattern::default()
    }

    /// Appends a clause.
    #[must_use]
    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Sets the residual spec.
    #[must_use]
    pub fn residual(mut self, residual: Residual) -> Self {
        self.residual = Some(residual);
        self
    }
}

/// The pattern AST.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Matches a structurally equal value.
    Literal(Value),
    /// Matches a string value containing a match of this regex (unanchored;
    /// non-strings never match).
    Regex(Regex),
    /// Matches exactly one value of any shape.
    Wildcard,
    /// Binds (or unifies) one value under this name.
    Var(String),
    /// Binds a contiguous element run (sequence context), a key subset
    /// (clause/residual context), or a degenerate one-element group.
    GroupVar(String),
    /// Matches `inner`, then binds what it matched under `name`.
    Bind {
        /// Binder name.
        name: String,
        /// Bind as a group (consumed region) instead of a scalar.
        group: bool,
        /// The gating pattern.
        inner: Box<Pattern>,
    },
    /// Enumerates all of the left branch's solutions, then all of the
    /// right's. The right branch is never short-circuited away.
    Alt(Box<Pattern>, Box<Pattern>),
    /// Zero-width assertion. Runs `inner` on a scratch environment and
    /// yields the original environment unchanged.
    Lookahead {
        /// `true` requires at least one solution of `inner`; `false`
        /// requires none.
        positive: bool,
        /// The asserted pattern.
        inner: Box<Pattern>,
    },
    /// Repeats `inner` over consecutive sequence elements. Only meaningful
    /// as a sequence item.
    Repeat {
        /// Pattern each consumed element must match.
        inner: Box<Pattern>,
        /// Feasible repetition counts.
        count: CountRange,
        /// Take-count enumeration order.
        mode: RepeatMode,
    },
    /// Anchored pattern over a sequence: the items must consume the whole
    /// array exactly.
    Sequence(Vec<Pattern>),
    /// Clause-based pattern over a mapping.
    Object(ObjectPattern),
}

impl Pattern {
    /// Matches a value structurally equal to `value`.
    pub fn literal(value: impl Into<Value>) -> Self {
        Pattern::Literal(value.into())
    }

    /// Compiles a regex pattern.
    ///
    /// # Errors
    ///
    /// [`PatternError::RegexTooLong`] when the source exceeds
    /// [`MAX_REGEX_PATTERN_LENGTH`], [`PatternError::InvalidRegex`] when it
    /// does not compile.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        if pattern.len() > MAX_REGEX_PATTERN_LENGTH {
            return Err(PatternError::RegexTooLong {
                len: pattern.len(),
                max: MAX_REGEX_PATTERN_LENGTH,
            });
        }
        let compiled = Regex::new(pattern).map_err(|err| PatternError::InvalidRegex {
            pattern: pattern.to_owned(),
            message: err.to_string(),
        })?;
        Ok(Pattern::Regex(compiled))
    }

    /// A scalar variable.
    pub fn var(name: impl Into<String>) -> Self {
        Pattern::Var(name.into())
    }

    /// A group variable.
    pub fn group_var(name: impl Into<String>) -> Self {
        Pattern::GroupVar(name.into())
    }

    /// Matches `inner` and binds the matched value as a scalar.
    pub fn bind(name: impl Into<String>, inner: Pattern) -> Self {
        Pattern::Bind {
            name: name.into(),
            group: false,
            inner: Box::new(inner),
        }
    }

    /// Matches `inner` and binds the consumed region as a group.
    pub fn bind_group(name: impl Into<String>, inner: Pattern) -> Self {
        Pattern::Bind {
            name: name.into(),
            group: true,
            inner: Box::new(inner),
        }
    }

    /// Tries `left`, then `right`.
    #[must_use]
    pub fn alt(left: Pattern, right: Pattern) -> Self {
        Pattern::Alt(Box::new(left), Box::new(right))
    }

    /// Positive lookahead: succeeds (binding nothing) iff `inner` matches.
    #[must_use]
    pub fn peek(inner: Pattern) -> Self {
        Pattern::Lookahead {
            positive: true,
            inner: Box::new(inner),
        }
    }

    /// Negative lookahead: succeeds (binding nothing) iff `inner` does not
    /// match.
    #[must_use]
    pub fn peek_not(inner: Pattern) -> Self {
        Pattern::Lookahead {
            positive: false,
            inner: Box::new(inner),
        }
    }

    /// Greedy repetition of a sequence item.
    #[must_use]
    pub fn repeat(inner: Pattern, count: CountRange) -> Self {
        Pattern::Repeat {
            inner: Box::new(inner),
            count,
            mode: RepeatMode::Greedy,
        }
    }

    /// Lazy repetition: shortest take first.
    #[must_use]
    pub fn repeat_lazy(inner: Pattern, count: CountRange) -> Self {
        Pattern::Repeat {
            inner: Box::new(inner),
            count,
            mode: RepeatMode::Lazy,
        }
    }

    /// Possessive repetition: commits to the largest take whose repetitions
    /// match, with no retry on downstream failure.
    #[must_use]
    pub fn repeat_possessive(inner: Pattern, count: CountRange) -> Self {
        Pattern::Repeat {
            inner: Box::new(inner),
            count,
            mode: RepeatMode::Possessive,
        }
    }

    /// The `..` rest item: a lazy zero-or-more wildcard run.
    #[must_use]
    pub fn rest() -> Self {
        Pattern::repeat_lazy(Pattern::Wildcard, CountRange::any())
    }

    /// An anchored sequence pattern.
    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Pattern>,
    {
        Pattern::Sequence(items.into_iter().collect())
    }

    /// A clause-based object pattern.
    #[must_use]
    pub fn object(object: ObjectPattern) -> Self {
        Pattern::Object(object)
    }

    /// Maximum nesting depth of this AST.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Pattern::Literal(_) | Pattern::Regex(_) | Pattern::Wildcard => 1,
            Pattern::Var(_) | Pattern::GroupVar(_) => 1,
            Pattern::Bind { inner, .. }
            | Pattern::Lookahead { inner, .. }
            | Pattern::Repeat { inner, .. } => 1 + inner.depth(),
            Pattern::Alt(l, r) => 1 + l.depth().max(r.depth()),
            Pattern::Sequence(items) => {
                1 + items.iter().map(Pattern::depth).max().unwrap_or(0)
            }
            Pattern::Object(obj) => {
                let clauses = obj
                    .clauses
                    .iter()
                    .map(|c| c.key.depth().max(c.value.depth()))
                    .max()
                    .unwrap_or(0);
                1 + clauses
            }
        }
    }

    /// Checks whole-AST usage rules before matching.
    ///
    /// # Errors
    ///
    /// [`PatternError::MixedKinds`] when a name is used as both scalar and
    /// group, [`PatternError::InvalidCount`] for inverted repetition ranges,
    /// [`PatternError::RepeatOutsideSequence`] when repetition appears where
    /// it cannot consume elements, and [`PatternError::DepthExceeded`] past
    /// [`MAX_PATTERN_DEPTH`].
    pub fn validate(&self) -> Result<(), PatternError> {
        let mut kinds = HashMap::new();
        self.check(1, false, &mut kinds)
    }

    fn check(
        &self,
        depth: usize,
        as_item: bool,
        kinds: &mut HashMap<String, bool>,
    ) -> Result<(), PatternError> {
        if depth > MAX_PATTERN_DEPTH {
            return Err(PatternError::DepthExceeded {
                depth,
                max: MAX_PATTERN_DEPTH,
            });
        }
        match self {
            Pattern::Literal(_) | Pattern::Regex(_) | Pattern::Wildcard => Ok(()),
            Pattern::Var(name) => record_kind(kinds, name, false),
            Pattern::GroupVar(name) => record_kind(kinds, name, true),
            Pattern::Bind { name, group, inner } => {
                record_kind(kinds, name, *group)?;
                // A group binder may wrap a repetition item; scalar binders
                // never consume more than one element.
                inner.check(depth + 1, as_item && *group, kinds)
            }
            Pattern::Alt(l, r) => {
                l.check(depth + 1, as_item, kinds)?;
                r.check(depth + 1, as_item, kinds)
            }
            Pattern::Lookahead { inner, .. } => inner.check(depth + 1, false, kinds),
            Pattern::Repeat { inner, count, .. } => {
                if !as_item {
                    return Err(PatternError::RepeatOutsideSequence);
                }
                check_count(count)?;
                inner.check(depth + 1, false, kinds)
            }
            Pattern::Sequence(items) => {
                for item in items {
                    item.check(depth + 1, true, kinds)?;
                }
                Ok(())
            }
            Pattern::Object(obj) => {
                for clause in &obj.clauses {
                    clause.key.check(depth + 1, false, kinds)?;
                    clause.value.check(depth + 1, false, kinds)?;
                    for step in &clause.steps {
                        if let Step::Var(name) = step {
                            record_kind(kinds, name, false)?;
                        }
                    }
                    if let Some(count) = &clause.count {
                        check_count(count)?;
                    }
                }
                if let Some(residual) = &obj.residual {
                    if let Some(count) = &residual.count {
                        check_count(count)?;
                    }
                    if let Some(name) = &residual.bind {
                        record_kind(kinds, name, true)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn record_kind(
    kinds: &mut HashMap<String, bool>,
    name: &str,
    group: bool,
) -> Result<(), PatternError> {
    match kinds.get(name) {
        Some(&existing) if existing != group => Err(PatternError::MixedKinds {
            name: name.to_owned(),
        }),
        Some(_) => Ok(()),
        None => {
            kinds.insert(name.to_owned(), group);
            Ok(())
        }
    }
}

fn check_count(count: &CountRange) -> Result<(), PatternError> {
    if count.ordered() {
        Ok(())
    } else {
        Err(PatternError::InvalidCount {
            min: count.min,
            // ordered() only fails when max is present and below min
            max: count.max.unwrap_or(0),
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(v) => write!(f, "{v}"),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            Pattern::Wildcard => f.write_str("_"),
            Pattern::Var(name) => write!(f, "${name}"),
            Pattern::GroupVar(name) => write!(f, "${name}.."),
            Pattern::Bind { name, group, inner } => {
                let suffix = if *group { ".." } else { "" };
                write!(f, "({inner} as ${name}{suffix})")
            }
            Pattern::Alt(l, r) => write!(f, "({l} | {r})"),
            Pattern::Lookahead { positive, inner } => {
                if *positive {
                    write!(f, "(?={inner})")
                } else {
                    write!(f, "(?!{inner})")
                }
            }
            Pattern::Repeat { inner, count, mode } => {
                let suffix = match mode {
                    RepeatMode::Greedy => "",
                    RepeatMode::Lazy => "?",
                    RepeatMode::Possessive => "+",
                };
                write!(f, "{inner}{count}{suffix}")
            }
            Pattern::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Pattern::Object(obj) => {
                f.write_str("{")?;
                for (i, clause) in obj.clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    if clause.universal {
                        f.write_str("all ")?;
                    }
                    write!(f, "{}", clause.key)?;
                    for step in &clause.steps {
                        match step {
                            Step::Key(k) => write!(f, ".{k}")?,
                            Step::Index(i) => write!(f, "[{i}]")?,
                            Step::Var(name) => write!(f, ".${name}")?,
                        }
                    }
                    if let Some(count) = &clause.count {
                        write!(f, "#{count}")?;
                    }
                    write!(f, " => {}", clause.value)?;
                }
                if let Some(residual) = &obj.residual {
                    if !obj.clauses.is_empty() {
                        f.write_str("; ")?;
                    }
                    f.write_str("rest")?;
                    if let Some(count) = &residual.count {
                        write!(f, "#{count}")?;
                    }
                    if let Some(name) = &residual.bind {
                        write!(f, " as ${name}..")?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}
