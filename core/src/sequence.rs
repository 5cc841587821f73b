//! Anchored matching of sequence patterns against sequence values.
//!
//! Items are matched left to right through continuations: each item routine
//! receives the index of the next unconsumed element and passes the advanced
//! index to its continuation. The whole pattern succeeds only when the last
//! continuation lands exactly on the end of the value, which is what makes
//! matching anchored at both ends.
//!
//! Path and environment discipline follow [`crate::engine`].

use std::ops::ControlFlow;

use crate::engine::{any_match, match_pattern, Emit, Search};
use crate::env::{Env, GroupRegion, Site};
use crate::pattern::{CountRange, Pattern, RepeatMode};
use crate::value::{PathStep, Value};
use crate::MatchError;

/// Continuation for sequence items; the `usize` is the index of the first
/// element the rest of the pattern must consume.
type SeqEmit<'a> = dyn FnMut(&mut Search<'_>, &mut Vec<PathStep>, usize, &Env) -> Result<ControlFlow<()>, MatchError>
    + 'a;

/// What a bare group variable expands to as a sequence item.
static GROUP_INNER: Pattern = Pattern::Wildcard;

pub(crate) fn match_sequence(
    cx: &mut Search<'_>,
    items: &[Pattern],
    values: &[Value],
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    match_items(cx, items, 0, values, 0, path, env, emit)
}

#[allow(clippy::too_many_arguments)]
fn match_items(
    cx: &mut Search<'_>,
    items: &[Pattern],
    item_idx: usize,
    values: &[Value],
    val_idx: usize,
    path: &mut Vec<PathStep>,
    env: &Env,
    emit: &mut Emit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    if item_idx == items.len() {
        // Anchoring: leftover elements mean this branch dies.
        return if val_idx == values.len() {
            emit(cx, path, env)
        } else {
            Ok(ControlFlow::Continue(()))
        };
    }
    let item = &items[item_idx];
    match_one(cx, item, values, val_idx, path, env, &mut |cx,
                                                          path,
                                                          next_val,
                                                          env| {
        match_items(cx, items, item_idx + 1, values, next_val, path, env, emit)
    })
}

/// Matches a single item starting at `val_idx`, feeding `k` every
/// (environment, advanced index) pair the item admits.
fn match_one(
    cx: &mut Search<'_>,
    item: &Pattern,
    values: &[Value],
    val_idx: usize,
    path: &mut Vec<PathStep>,
    env: &Env,
    k: &mut SeqEmit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    cx.tick(item, path)?;
    match item {
        Pattern::Repeat { inner, count, mode } => {
            match_repeat(cx, inner, *count, *mode, values, val_idx, path, env, k)
        }
        Pattern::GroupVar(name) => {
            let container = path.clone();
            match_repeat(
                cx,
                &GROUP_INNER,
                CountRange::any(),
                RepeatMode::Lazy,
                values,
                val_idx,
                path,
                env,
                &mut |cx, path, end, env| {
                    let region = GroupRegion::Span {
                        container: container.clone(),
                        start: val_idx,
                        end,
                    };
                    match env.bind_group(name, region, cx.root) {
                        Some(bound) => k(cx, path, end, &bound),
                        None => Ok(ControlFlow::Continue(())),
                    }
                },
            )
        }
        Pattern::Bind {
            name,
            group: true,
            inner,
        } => {
            let container = path.clone();
            match_one(cx, inner, values, val_idx, path, env, &mut |cx,
                                                                   path,
                                                                   end,
                                                                   inner_env| {
                let region = GroupRegion::Span {
                    container: container.clone(),
                    start: val_idx,
                    end,
                };
                match inner_env.bind_group(name, region, cx.root) {
                    Some(bound) => k(cx, path, end, &bound),
                    None => Ok(ControlFlow::Continue(())),
                }
            })
        }
        Pattern::Alt(left, right) => {
            let flow = match_one(cx, left, values, val_idx, path, env, k)?;
            if flow.is_break() {
                return Ok(flow);
            }
            match_one(cx, right, values, val_idx, path, env, k)
        }
        Pattern::Lookahead { positive, inner } => {
            // Zero-width: probe the upcoming element without consuming it.
            let hit = if val_idx < values.len() {
                path.push(PathStep::Index(val_idx));
                let probed = any_match(cx, inner, &values[val_idx], Site::Value, path, env);
                path.pop();
                probed?
            } else {
                false
            };
            if hit == *positive {
                k(cx, path, val_idx, env)
            } else {
                Ok(ControlFlow::Continue(()))
            }
        }
        _ => {
            // Everything else consumes exactly one element.
            if val_idx >= values.len() {
                return Ok(ControlFlow::Continue(()));
            }
            path.push(PathStep::Index(val_idx));
            let flow = match_pattern(
                cx,
                item,
                &values[val_idx],
                Site::Value,
                path,
                env,
                &mut |cx, path, env| {
                    path.pop();
                    let r = k(cx, path, val_idx + 1, env);
                    path.push(PathStep::Index(val_idx));
                    r
                },
            );
            path.pop();
            flow
        }
    }
}

/// Enumerates take-counts for a repetition in mode order and matches `inner`
/// against that many consecutive elements.
#[allow(clippy::too_many_arguments)]
fn match_repeat(
    cx: &mut Search<'_>,
    inner: &Pattern,
    count: CountRange,
    mode: RepeatMode,
    values: &[Value],
    val_idx: usize,
    path: &mut Vec<PathStep>,
    env: &Env,
    k: &mut SeqEmit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    let remaining = values.len() - val_idx;
    if count.min > remaining {
        return Ok(ControlFlow::Continue(()));
    }
    let hi = count.max.map_or(remaining, |m| m.min(remaining));
    match mode {
        RepeatMode::Greedy => {
            let mut take = hi;
            loop {
                let flow = take_reps(cx, inner, values, val_idx, take, path, env, k)?;
                if flow.is_break() {
                    return Ok(flow);
                }
                if take == count.min {
                    return Ok(ControlFlow::Continue(()));
                }
                take -= 1;
            }
        }
        RepeatMode::Lazy => {
            for take in count.min..=hi {
                let flow = take_reps(cx, inner, values, val_idx, take, path, env, k)?;
                if flow.is_break() {
                    return Ok(flow);
                }
            }
            Ok(ControlFlow::Continue(()))
        }
        RepeatMode::Possessive => {
            // Commit to the largest take-count whose repetitions match at
            // all; smaller counts are never retried, even when the rest of
            // the pattern fails downstream.
            let mut take = hi;
            loop {
                let mut viable = false;
                let flow = take_reps(cx, inner, values, val_idx, take, path, env, &mut |cx,
                                                                                       path,
                                                                                       end,
                                                                                       env| {
                    viable = true;
                    k(cx, path, end, env)
                })?;
                if flow.is_break() {
                    return Ok(flow);
                }
                if viable || take == count.min {
                    return Ok(ControlFlow::Continue(()));
                }
                take -= 1;
            }
        }
    }
}

/// Matches `inner` against exactly `left` consecutive elements, then hands
/// the index past them to `done`.
#[allow(clippy::too_many_arguments)]
fn take_reps(
    cx: &mut Search<'_>,
    inner: &Pattern,
    values: &[Value],
    val_idx: usize,
    left: usize,
    path: &mut Vec<PathStep>,
    env: &Env,
    done: &mut SeqEmit<'_>,
) -> Result<ControlFlow<()>, MatchError> {
    if left == 0 {
        return done(cx, path, val_idx, env);
    }
    path.push(PathStep::Index(val_idx));
    let flow = match_pattern(
        cx,
        inner,
        &values[val_idx],
        Site::Value,
        path,
        env,
        &mut |cx, path, env| {
            path.pop();
            let r = take_reps(cx, inner, values, val_idx + 1, left - 1, path, env, done);
            path.push(PathStep::Index(val_idx));
            r
        },
    );
    path.pop();
    flow
}
