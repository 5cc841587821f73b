//! Clause matching of object patterns against mapping values.
//!
//! Unlike sequences, mappings are not consumed positionally: each clause
//! independently computes its candidate key set, checks its cardinality over
//! that whole set, and then branches over candidates as witnesses. Pairs may
//! satisfy several clauses. The union of all candidate sets is the *touched*
//! set; pairs outside it form the residual, which carries its own optional
//! cardinality and group binding.
//!
//! Path and environment discipline follow [`crate::engine`].

use std::ops::ControlFlow;

use crate::engine::{any_match, match_pattern, Emit, Search};
use crate::env::{Env, GroupRegion, Site};
use crate::pattern::{Clause, ObjectPattern, Step};
use crate::value::{PathStep, Value};
use crate::MatchError;

pub(crate) fn match_object(
    cx: &mut Search<'_>,
    object: &ObjectPattern,
    pairs: &[(String, Value)],
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    let base = path.len();
    let touched = vec![false; pairs.len()];
    match_clauses(cx, object, 0, pairs, &touched, base, path, env, emit)
}

/// Matches clause `clause_idx` and the rest of the object pattern.
///
/// `touched[i]` records whether pair `i` has been a candidate of any clause
/// so far on this branch; `base` is the path length at the mapping itself.
#[allow(clippy::too_many_arguments)]
fn match_clauses(
    cx: &mut Search<'_>,
    object: &ObjectPattern,
    clause_idx: usize,
    pairs: &[(String, Value)],
    touched: &[bool],
    base: usize,
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    if clause_idx == object.clauses.len() {
        return finish_residual(cx, object, pairs, touched, path, env, emit);
    }
    let clause = &object.clauses[clause_idx];

    // Candidate keys, each tested on its own scratch environment.
    let mut candidates = Vec::new();
    for (i, (key, _)) in pairs.iter().enumerate() {
        if key_matches(cx, clause, key, path, env)? {
            candidates.push(i);
        }
    }

    // Cardinality is judged once, over the whole candidate set. There is no
    // backtracking over candidate subsets.
    if !clause_count_ok(clause, candidates.len()) {
        return Ok(ControlFlow::Continue(()));
    }

    let mut touched_next = touched.to_vec();
    for &i in &candidates {
        touched_next[i] = true;
    }

    if clause.universal {
        for &i in &candidates {
            if !candidate_satisfies(cx, clause, &pairs[i], path, env)? {
                return Ok(ControlFlow::Continue(()));
            }
        }
    }

    if candidates.is_empty() {
        return match_clauses(
            cx,
            object,
            clause_idx + 1,
            pairs,
            &touched_next,
            base,
            path,
            env,
            emit,
        );
    }

    // Witness branching: each candidate is one way to satisfy the clause,
    // and its key-site and value bindings flow into the later clauses.
    for &i in &candidates {
        let flow = match_candidate(
            cx,
            object,
            clause_idx,
            pairs,
            i,
            &touched_next,
            base,
            path,
            env,
            emit,
        )?;
        if flow.is_break() {
            return Ok(flow);
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// Whether `key` satisfies the clause's key pattern. Bindings made during
/// the test are discarded before the next key is examined.
fn key_matches(
    cx: &mut Search<'_>,
    clause: &Clause,
    key: &str,
    path: &mut Vec<PathStep>,
    env: &Env,
) -> Result<bool, MatchError> {
    let key_val = Value::from(key);
    path.push(PathStep::Key(key.to_owned()));
    let hit = any_match(cx, &clause.key, &key_val, Site::Key, path, env);
    path.pop();
    hit
}

fn clause_count_ok(clause: &Clause, candidates: usize) -> bool {
    match clause.count {
        Some(count) => count.contains(candidates),
        None => clause.optional || candidates >= 1,
    }
}

/// The universal check for one candidate: key bindings feed the value test,
/// then the whole scratch environment is dropped.
fn candidate_satisfies(
    cx: &mut Search<'_>,
    clause: &Clause,
    pair: &(String, Value),
    path: &mut Vec<PathStep>,
    env: &Env,
) -> Result<bool, MatchError> {
    let (key, pair_value) = pair;
    let key_val = Value::from(key.as_str());
    let mut ok = false;
    path.push(PathStep::Key(key.clone()));
    let after_key = path.len();
    // The Break that stops this probe is not a caller-level Break.
    let _ = match_pattern(
        cx,
        &clause.key,
        &key_val,
        Site::Key,
        path,
        env,
        &mut |cx, path, env_k| {
            let Some(target) = descend(&clause.steps, pair_value, path, env_k) else {
                path.truncate(after_key);
                return Ok(ControlFlow::Continue(()));
            };
            let hit = any_match(cx, &clause.value, target, Site::Value, path, env_k);
            path.truncate(after_key);
            if hit? {
                ok = true;
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        },
    )?;
    path.pop();
    Ok(ok)
}

/// Matches one witness pair against the clause, then continues with the
/// remaining clauses back at the mapping itself.
#[allow(clippy::too_many_arguments)]
fn match_candidate(
    cx: &mut Search<'_>,
    object: &ObjectPattern,
    clause_idx: usize,
    pairs: &[(String, Value)],
    pair_idx: usize,
    touched: &[bool],
    base: usize,
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    let clause = &object.clauses[clause_idx];
    let (key, pair_value) = &pairs[pair_idx];
    let key_val = Value::from(key.as_str());
    path.push(PathStep::Key(key.clone()));
    let flow = match_pattern(
        cx,
        &clause.key,
        &key_val,
        Site::Key,
        path,
        env,
        &mut |cx, path, env_k| {
            let after_key = path.len();
            let Some(target) = descend(&clause.steps, pair_value, path, env_k) else {
                path.truncate(after_key);
                return Ok(ControlFlow::Continue(()));
            };
            let flow = match_pattern(
                cx,
                &clause.value,
                target,
                Site::Value,
                path,
                env_k,
                &mut |cx, path, env_v| {
                    // Later clauses test keys relative to the mapping, so
                    // rewind the path to it and restore afterwards.
                    let saved = path.split_off(base);
                    let r = match_clauses(
                        cx,
                        object,
                        clause_idx + 1,
                        pairs,
                        touched,
                        base,
                        path,
                        env_v,
                        emit,
                    );
                    path.extend(saved);
                    r
                },
            );
            path.truncate(after_key);
            flow
        },
    );
    path.pop();
    flow
}

/// Resolves breadcrumb steps from a candidate's value, extending `path` by
/// one step per breadcrumb. On `None` the path may hold partial steps; the
/// caller truncates back.
fn descend<'v>(
    steps: &[Step],
    start: &'v Value,
    path: &mut Vec<PathStep>,
    env: &Env,
) -> Option<&'v Value> {
    let mut value = start;
    for step in steps {
        match step {
            Step::Key(k) => {
                value = value.get(k)?;
                path.push(PathStep::Key(k.clone()));
            }
            Step::Index(i) => {
                value = value.get_index(*i)?;
                path.push(PathStep::Index(*i));
            }
            Step::Var(name) => match env.scalar(name)? {
                Value::String(k) => {
                    value = value.get(k)?;
                    path.push(PathStep::Key(k.clone()));
                }
                Value::Number(n) => {
                    let n = *n;
                    if n.fract() != 0.0 || n < 0.0 || n > usize::MAX as f64 {
                        return None;
                    }
                    let i = n as usize;
                    value = value.get_index(i)?;
                    path.push(PathStep::Index(i));
                }
                _ => return None,
            },
        }
    }
    Some(value)
}

/// The pairs no clause claimed: cardinality check, then optional group bind.
fn finish_residual(
    cx: &mut Search<'_>,
    object: &ObjectPattern,
    pairs: &[(String, Value)],
    touched: &[bool],
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    let Some(residual) = &object.residual else {
        return emit(cx, path, env);
    };
    let untouched: Vec<usize> = (0..pairs.len()).filter(|&i| !touched[i]).collect();
    if let Some(count) = residual.count {
        if !count.contains(untouched.len()) {
            return Ok(ControlFlow::Continue(()));
        }
    }
    let Some(name) = &residual.bind else {
        return emit(cx, path, env);
    };
    let region = GroupRegion::Keys {
        container: path.clone(),
        keys: untouched.iter().map(|&i| pairs[i].0.clone()).collect(),
    };
    match env.bind_group(name, region, cx.root) {
        Some(bound) => emit(cx, path, &bound),
        None => Ok(ControlFlow::Continue(())),
    }
}
