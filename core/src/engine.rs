//! The backtracking search core and the [`Matcher`] facade.
//!
//! Matching is continuation-passing: every internal routine takes an `emit`
//! sink and hands it each environment that completes the sub-match. Sinks
//! return [`ControlFlow`], so a `Break` from the caller unwinds the whole
//! search immediately; resource errors travel the `Result` channel and abort
//! the attempt.
//!
//! Two invariants hold everywhere in this module and its helpers
//! ([`crate::sequence`], [`crate::clauses`], [`crate::find`]):
//!
//! * `path` names the value currently being inspected; every routine
//!   restores it to its entry state before calling `emit` and before
//!   returning.
//! * environments are never mutated: binds fork a fresh [`Env`], so sibling
//!   branches stay independent without any rollback machinery.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crate::env::{Env, GroupRegion, Site, Solution};
use crate::find::{self, Found};
use crate::pattern::Pattern;
use crate::value::{render_path, PathStep, Value};
use crate::{clauses, sequence, trace_search};
use crate::{MatchError, PatternError, DEFAULT_MAX_DEPTH};

/// Resource knobs for one match or find attempt.
#[derive(Clone, Debug)]
pub struct MatchOptions {
    /// Maximum input nesting accepted; deeper (or cyclic, in models that
    /// allow it) input is rejected upfront with
    /// [`MatchError::DepthExceeded`].
    pub max_depth: usize,
    /// Abort after this many search steps with
    /// [`MatchError::BudgetExceeded`].
    pub max_steps: Option<u64>,
    /// Abort once this much wall-clock time has elapsed with
    /// [`MatchError::DeadlineExceeded`].
    pub time_budget: Option<Duration>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            max_steps: None,
            time_budget: None,
        }
    }
}

impl MatchOptions {
    /// Options with all defaults: depth capped at [`DEFAULT_MAX_DEPTH`], no
    /// step or time budget.
    #[must_use]
    pub fn new() -> Self {
        MatchOptions::default()
    }

    /// Caps accepted input nesting.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets a step budget.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Sets a wall-clock budget.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Per-attempt search state: the root (for resolving group regions), the
/// options, and the running step count.
pub(crate) struct Search<'a> {
    pub(crate) root: &'a Value,
    opts: &'a MatchOptions,
    steps: u64,
    started: Instant,
}

impl<'a> Search<'a> {
    pub(crate) fn new(root: &'a Value, opts: &'a MatchOptions) -> Self {
        Search {
            root,
            opts,
            steps: 0,
            started: Instant::now(),
        }
    }

    /// Counts one search step and enforces the step/time budgets.
    pub(crate) fn tick(&mut self, pat: &Pattern, path: &[PathStep]) -> Result<(), MatchError> {
        self.steps += 1;
        if let Some(max) = self.opts.max_steps {
            if self.steps > max {
                return Err(MatchError::BudgetExceeded {
                    path: render_path(path),
                    pattern: pat.to_string(),
                    budget: max,
                });
            }
        }
        if let Some(budget) = self.opts.time_budget {
            // Instant::now is not free; sample the clock every 64 steps.
            if self.steps % 64 == 0 && self.started.elapsed() > budget {
                return Err(MatchError::DeadlineExceeded {
                    path: render_path(path),
                    pattern: pat.to_string(),
                    budget,
                });
            }
        }
        Ok(())
    }
}

/// The sink match routines feed completed environments into.
///
/// The first two arguments re-lend the search state and path so the
/// continuation can keep matching; capturing them instead would alias the
/// caller's borrows.
pub(crate) type Emit<'a> = dyn FnMut(&mut Search<'_>, &mut Vec<PathStep>, &Env) -> Result<ControlFlow<()>, MatchError>
    + 'a;

/// Rejects input nested beyond `limit` before the search descends into it.
///
/// Recursion here is bounded by `limit + 1` frames: descent stops at the
/// first offending position and reports its path.
fn check_input_depth(
    value: &Value,
    depth: usize,
    limit: usize,
    path: &mut Vec<PathStep>,
) -> Result<(), MatchError> {
    if depth > limit {
        return Err(MatchError::DepthExceeded {
            path: render_path(path),
            max: limit,
        });
    }
    match value {
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(PathStep::Index(i));
                let checked = check_input_depth(item, depth + 1, limit, path);
                path.pop();
                checked?;
            }
            Ok(())
        }
        Value::Mapping(pairs) => {
            for (k, v) in pairs {
                path.push(PathStep::Key(k.clone()));
                let checked = check_input_depth(v, depth + 1, limit, path);
                path.pop();
                checked?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// The degenerate group region for a group variable at a single position:
/// a one-key subset at key sites, a one-element group elsewhere.
fn degenerate_region(site: Site, path: &[PathStep]) -> GroupRegion {
    if site == Site::Key {
        if let Some((PathStep::Key(key), container)) = path.split_last() {
            return GroupRegion::Keys {
                container: container.to_vec(),
                keys: vec![key.clone()],
            };
        }
    }
    GroupRegion::Single { at: path.to_vec() }
}

/// One recursive dispatch over the pattern AST.
///
/// Yields zero or more environments through `emit`; a structural mismatch is
/// silence, never an error.
pub(crate) fn match_pattern(
    cx: &mut Search<'_>,
    pat: &Pattern,
    value: &Value,
    site: Site,
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    cx.tick(pat, path)?;
    match pat {
        Pattern::Literal(lit) => {
            if lit == value {
                emit(cx, path, env)
            } else {
                Ok(ControlFlow::Continue(()))
            }
        }
        Pattern::Regex(re) => {
            if value.as_str().is_some_and(|s| re.is_match(s)) {
                emit(cx, path, env)
            } else {
                Ok(ControlFlow::Continue(()))
            }
        }
        Pattern::Wildcard => emit(cx, path, env),
        Pattern::Var(name) => match env.bind_scalar(name, value, path, site) {
            Some(bound) => emit(cx, path, &bound),
            None => Ok(ControlFlow::Continue(())),
        },
        Pattern::GroupVar(name) => {
            match env.bind_group(name, degenerate_region(site, path), cx.root) {
                Some(bound) => emit(cx, path, &bound),
                None => Ok(ControlFlow::Continue(())),
            }
        }
        Pattern::Bind { name, group, inner } => {
            let group = *group;
            match_pattern(cx, inner, value, site, path, env, &mut |cx, path, inner_env| {
                let bound = if group {
                    inner_env.bind_group(name, degenerate_region(site, path), cx.root)
                } else {
                    inner_env.bind_scalar(name, value, path, site)
                };
                match bound {
                    Some(next) => emit(cx, path, &next),
                    None => Ok(ControlFlow::Continue(())),
                }
            })
        }
        Pattern::Alt(left, right) => {
            let flow = match_pattern(cx, left, value, site, path, env, emit)?;
            if flow.is_break() {
                return Ok(flow);
            }
            match_pattern(cx, right, value, site, path, env, emit)
        }
        Pattern::Lookahead { positive, inner } => {
            let hit = any_match(cx, inner, value, site, path, env)?;
            if hit == *positive {
                emit(cx, path, env)
            } else {
                Ok(ControlFlow::Continue(()))
            }
        }
        // Repetition only consumes elements inside a sequence; validate()
        // rejects every other placement before matching begins.
        Pattern::Repeat { .. } => Ok(ControlFlow::Continue(())),
        Pattern::Sequence(items) => match value {
            Value::Sequence(values) => {
                sequence::match_sequence(cx, items, values, path, env, emit)
            }
            _ => Ok(ControlFlow::Continue(())),
        },
        Pattern::Object(object) => match value {
            Value::Mapping(pairs) => clauses::match_object(cx, object, pairs, path, env, emit),
            _ => Ok(ControlFlow::Continue(())),
        },
    }
}

/// Existence check on a scratch environment: does `pat` admit at least one
/// solution here? Bindings made inside never escape.
pub(crate) fn any_match(
    cx: &mut Search<'_>,
    pat: &Pattern,
    value: &Value,
    site: Site,
    path: &mut Vec<PathStep>,
    env: &Env,
) -> Result<bool, MatchError> {
    let mut found = false;
    // The Break that stops this probe is not a caller-level Break.
    let _ = match_pattern(cx, pat, value, site, path, env, &mut |_, _, _| {
        found = true;
        Ok(ControlFlow::Break(()))
    })?;
    Ok(found)
}

/// A validated pattern plus the resource options to run it with.
///
/// Construction validates the pattern eagerly, so usage errors surface here
/// and never during matching.
///
/// # Example
///
/// ```
/// use std::ops::ControlFlow;
/// use treema::{Matcher, Pattern, Value};
///
/// let matcher = Matcher::new(Pattern::seq([
///     Pattern::var("x"),
///     Pattern::var("x"),
/// ]))?;
///
/// let twins = Value::seq([Value::from("q"), Value::from("q")]);
/// let solutions = matcher.solutions(&twins)?;
/// assert_eq!(solutions.len(), 1);
/// assert_eq!(solutions[0].get("x"), Some(&Value::from("q")));
///
/// let mixed = Value::seq([Value::from("q"), Value::from("r")]);
/// assert!(!matcher.is_match(&mixed)?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct Matcher {
    pattern: Pattern,
    options: MatchOptions,
}

impl Matcher {
    /// Validates `pattern` and wraps it with default options.
    ///
    /// # Errors
    ///
    /// Any [`PatternError`] reported by [`Pattern::validate`].
    pub fn new(pattern: Pattern) -> Result<Self, PatternError> {
        Matcher::with_options(pattern, MatchOptions::default())
    }

    /// Validates `pattern` and wraps it with explicit options.
    ///
    /// # Errors
    ///
    /// Any [`PatternError`] reported by [`Pattern::validate`].
    pub fn with_options(pattern: Pattern, options: MatchOptions) -> Result<Self, PatternError> {
        pattern.validate()?;
        Ok(Matcher { pattern, options })
    }

    /// The validated pattern.
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The resource options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Streams every solution of the pattern anchored at `root`, stopping
    /// early when `visit` returns `Break`.
    ///
    /// # Errors
    ///
    /// [`MatchError`] when the input is nested beyond `max_depth` or a
    /// step/time budget runs out. Structural mismatch is not an error: the
    /// visitor is simply never called.
    pub fn for_each_solution<F>(&self, root: &Value, mut visit: F) -> Result<(), MatchError>
    where
        F: FnMut(Solution) -> ControlFlow<()>,
    {
        let mut path = Vec::new();
        check_input_depth(root, 0, self.options.max_depth, &mut path)?;
        trace_search!(pattern = %self.pattern, "match start");
        let mut cx = Search::new(root, &self.options);
        let env = Env::new();
        // A Break here means the visitor asked to stop; the search is over
        // either way.
        let _ = match_pattern(
            &mut cx,
            &self.pattern,
            root,
            Site::Value,
            &mut path,
            &env,
            &mut |cx, _path, env| Ok(visit(Solution::snapshot(env, cx.root))),
        )?;
        Ok(())
    }

    /// All solutions, in enumeration order.
    ///
    /// # Errors
    ///
    /// As [`Matcher::for_each_solution`].
    pub fn solutions(&self, root: &Value) -> Result<Vec<Solution>, MatchError> {
        let mut out = Vec::new();
        self.for_each_solution(root, |solution| {
            out.push(solution);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// The first solution, halting the search as soon as it is found.
    ///
    /// # Errors
    ///
    /// As [`Matcher::for_each_solution`].
    pub fn first(&self, root: &Value) -> Result<Option<Solution>, MatchError> {
        let mut out = None;
        self.for_each_solution(root, |solution| {
            out = Some(solution);
            ControlFlow::Break(())
        })?;
        Ok(out)
    }

    /// Whether the pattern matches at the root at all.
    ///
    /// # Errors
    ///
    /// As [`Matcher::for_each_solution`].
    pub fn is_match(&self, root: &Value) -> Result<bool, MatchError> {
        Ok(self.first(root)?.is_some())
    }

    /// Streams `(solution, occurrence path)` pairs for every subtree of
    /// `root` the pattern matches, in preorder: the root first, then
    /// sequence elements by index, then mapping values in pair order.
    ///
    /// # Errors
    ///
    /// As [`Matcher::for_each_solution`].
    pub fn for_each_find<F>(&self, root: &Value, mut visit: F) -> Result<(), MatchError>
    where
        F: FnMut(Found) -> ControlFlow<()>,
    {
        let mut path = Vec::new();
        check_input_depth(root, 0, self.options.max_depth, &mut path)?;
        let mut cx = Search::new(root, &self.options);
        // A Break here means the visitor asked to stop; the walk is over
        // either way.
        let _ = find::walk(&mut cx, &self.pattern, root, &mut path, &mut |found| {
            visit(found)
        })?;
        Ok(())
    }

    /// Every occurrence with its solutions, in traversal order.
    ///
    /// # Errors
    ///
    /// As [`Matcher::for_each_solution`].
    pub fn find_all(&self, root: &Value) -> Result<Vec<Found>, MatchError> {
        let mut out = Vec::new();
        self.for_each_find(root, |found| {
            out.push(found);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// The first occurrence in traversal order, halting the walk there.
    ///
    /// # Errors
    ///
    /// As [`Matcher::for_each_solution`].
    pub fn find_first(&self, root: &Value) -> Result<Option<Found>, MatchError> {
        let mut out = None;
        self.for_each_find(root, |found| {
            out = Some(found);
            ControlFlow::Break(())
        })?;
        Ok(out)
    }
}
