//! Declarative pattern descriptions, separate from the compiled AST.
//!
//! A [`PatternSpec`] is plain data: it can be built in code, or — with the
//! `serde` feature — loaded from YAML/JSON configuration. [`compile`] turns
//! it into a validated [`Pattern`]; errors surface at compile time, never
//! mid-match.
//!
//! [`compile`]: PatternSpec::compile

use crate::pattern::{
    Clause, CountRange, ObjectPattern, Pattern, RepeatMode, Residual, Step,
};
use crate::value::Value;
use crate::PatternError;

/// Declarative form of one pattern node.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum PatternSpec {
    /// Match a value structurally equal to `value`.
    Literal {
        /// The value to compare against.
        value: Value,
    },
    /// Match a string containing this regex (unanchored).
    Regex {
        /// Regex source, compiled at [`PatternSpec::compile`] time.
        pattern: String,
    },
    /// Match exactly one value of any shape.
    Wildcard,
    /// Bind one value as a scalar.
    Var {
        /// Variable name.
        name: String,
    },
    /// Bind an element run or key subset as a group.
    Group {
        /// Variable name.
        name: String,
    },
    /// Match `pattern`, then bind what it matched.
    Bind {
        /// Binder name.
        name: String,
        /// Bind the consumed region as a group instead of a scalar.
        #[cfg_attr(feature = "serde", serde(default))]
        group: bool,
        /// The gating pattern.
        pattern: Box<PatternSpec>,
    },
    /// Enumerate the left branch's solutions, then the right's.
    Alt {
        /// First branch.
        left: Box<PatternSpec>,
        /// Second branch; enumerated even when the first succeeds.
        right: Box<PatternSpec>,
    },
    /// Zero-width positive lookahead.
    Peek {
        /// The asserted pattern.
        pattern: Box<PatternSpec>,
    },
    /// Zero-width negative lookahead.
    PeekNot {
        /// The refuted pattern.
        pattern: Box<PatternSpec>,
    },
    /// Repeat `pattern` over consecutive sequence elements.
    Repeat {
        /// Pattern each consumed element must match.
        pattern: Box<PatternSpec>,
        /// Minimum repetitions.
        #[cfg_attr(feature = "serde", serde(default))]
        min: usize,
        /// Maximum repetitions; `None` is unbounded.
        #[cfg_attr(feature = "serde", serde(default))]
        max: Option<usize>,
        /// Take-count enumeration order.
        #[cfg_attr(feature = "serde", serde(default))]
        mode: RepeatModeSpec,
    },
    /// The `..` rest item: a lazy zero-or-more wildcard run.
    Rest,
    /// Anchored sequence pattern.
    Seq {
        /// Items, consumed left to right.
        items: Vec<PatternSpec>,
    },
    /// Clause-based object pattern.
    Object {
        /// Clauses over the mapping's pairs.
        #[cfg_attr(feature = "serde", serde(default))]
        clauses: Vec<ClauseSpec>,
        /// Constraint/binder for untouched pairs.
        #[cfg_attr(feature = "serde", serde(default))]
        residual: Option<ResidualSpec>,
    },
}

/// Take-count enumeration order for [`PatternSpec::Repeat`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RepeatModeSpec {
    /// Longest take first.
    #[default]
    Greedy,
    /// Shortest take first.
    Lazy,
    /// Largest viable take only; never retried.
    Possessive,
}

/// One key/value assertion of an object pattern.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClauseSpec {
    /// Pattern over the key string.
    pub key: PatternSpec,
    /// Breadcrumb steps descending from the pair's value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub steps: Vec<StepSpec>,
    /// Pattern at the final breadcrumb position; omitted means any value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<PatternSpec>,
    /// Constraint on the candidate-set size.
    #[cfg_attr(feature = "serde", serde(default))]
    pub count: Option<CountSpec>,
    /// Require every candidate's value to match.
    #[cfg_attr(feature = "serde", serde(default))]
    pub universal: bool,
    /// Allow an empty candidate set.
    #[cfg_attr(feature = "serde", serde(default))]
    pub optional: bool,
}

/// One breadcrumb step.
// Untagged: order matters! A number must try Index before the string form.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum StepSpec {
    /// A sequence index.
    Index(usize),
    /// A mapping key.
    Key(String),
    /// An already-bound variable holding the key or index.
    Var {
        /// Variable name.
        var: String,
    },
}

/// A cardinality constraint: a bare number or a `{min, max}` range.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum CountSpec {
    /// Exactly this many.
    Exact(usize),
    /// An inclusive range; omitted `max` is unbounded.
    Range {
        /// Lower bound.
        #[cfg_attr(feature = "serde", serde(default))]
        min: usize,
        /// Upper bound, inclusive.
        #[cfg_attr(feature = "serde", serde(default))]
        max: Option<usize>,
    },
}

impl CountSpec {
    fn compile(self) -> CountRange {
        match self {
            CountSpec::Exact(n) => CountRange::exactly(n),
            CountSpec::Range { min, max } => CountRange { min, max },
        }
    }
}

/// Constraint/binder for the pairs no clause touched.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResidualSpec {
    /// Constraint on how many pairs may remain untouched.
    #[cfg_attr(feature = "serde", serde(default))]
    pub count: Option<CountSpec>,
    /// Bind the untouched pairs as a group under this name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bind: Option<String>,
}

impl PatternSpec {
    /// Compiles and validates the described pattern.
    ///
    /// # Errors
    ///
    /// Regex compilation failures and every usage error
    /// [`Pattern::validate`] reports.
    pub fn compile(&self) -> Result<Pattern, PatternError> {
        let pattern = self.build()?;
        pattern.validate()?;
        Ok(pattern)
    }

    fn build(&self) -> Result<Pattern, PatternError> {
        Ok(match self {
            PatternSpec::Literal { value } => Pattern::Literal(value.clone()),
            PatternSpec::Regex { pattern } => Pattern::regex(pattern)?,
            PatternSpec::Wildcard => Pattern::Wildcard,
            PatternSpec::Var { name } => Pattern::var(name.clone()),
            PatternSpec::Group { name } => Pattern::group_var(name.clone()),
            PatternSpec::Bind {
                name,
                group,
                pattern,
            } => Pattern::Bind {
                name: name.clone(),
                group: *group,
                inner: Box::new(pattern.build()?),
            },
            PatternSpec::Alt { left, right } => Pattern::alt(left.build()?, right.build()?),
            PatternSpec::Peek { pattern } => Pattern::peek(pattern.build()?),
            PatternSpec::PeekNot { pattern } => Pattern::peek_not(pattern.build()?),
            PatternSpec::Repeat {
                pattern,
                min,
                max,
                mode,
            } => Pattern::Repeat {
                inner: Box::new(pattern.build()?),
                count: CountRange {
                    min: *min,
                    max: *max,
                },
                mode: match mode {
                    RepeatModeSpec::Greedy => RepeatMode::Greedy,
                    RepeatModeSpec::Lazy => RepeatMode::Lazy,
                    RepeatModeSpec::Possessive => RepeatMode::Possessive,
                },
            },
            PatternSpec::Rest => Pattern::rest(),
            PatternSpec::Seq { items } => {
                let items: Result<Vec<_>, _> = items.iter().map(PatternSpec::build).collect();
                Pattern::Sequence(items?)
            }
            PatternSpec::Object { clauses, residual } => {
                let mut object = ObjectPattern::new();
                for clause in clauses {
                    object = object.clause(clause.build()?);
                }
                if let Some(residual) = residual {
                    object = object.residual(residual.build());
                }
                Pattern::Object(object)
            }
        })
    }
}

impl ClauseSpec {
    fn build(&self) -> Result<Clause, PatternError> {
        let mut clause = Clause::new(self.key.build()?);
        for step in &self.steps {
            clause = clause.step(match step {
                StepSpec::Index(i) => Step::index(*i),
                StepSpec::Key(k) => Step::key(k.clone()),
                StepSpec::Var { var } => Step::var(var.clone()),
            });
        }
        if let Some(value) = &self.value {
            clause = clause.value(value.build()?);
        }
        if let Some(count) = self.count {
            clause = clause.count(count.compile());
        }
        if self.universal {
            clause = clause.universal();
        }
        if self.optional {
            clause = clause.optional();
        }
        Ok(clause)
    }
}

impl ResidualSpec {
    fn build(&self) -> Residual {
        let mut residual = Residual::new();
        if let Some(count) = self.count {
            residual = residual.count(count.compile());
        }
        if let Some(bind) = &self.bind {
            residual = residual.bind(bind.clone());
        }
        residual
    }
}
