//! Subtree search: running the anchored match at every position.
//!
//! The walk order is part of the API: the current value first, then
//! sequence elements by ascending index, then mapping values in pair order,
//! recursively. Every solution at a position is reported before the walk
//! descends.

use std::ops::ControlFlow;

use crate::engine::{match_pattern, Search};
use crate::env::{Env, Site, Solution};
use crate::pattern::Pattern;
use crate::value::{PathStep, Value};
use crate::MatchError;

/// One reported occurrence: the matched subtree's path and one solution of
/// the match rooted there.
#[derive(Clone, Debug)]
pub struct Found {
    path: Vec<PathStep>,
    solution: Solution,
}

impl Found {
    /// Path of the matched subtree.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[PathStep] {
        &self.path
    }

    /// Bindings of this occurrence. Binding paths stay relative to the
    /// search root, not to the occurrence.
    #[inline]
    #[must_use]
    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    /// Splits into the path and the solution.
    #[must_use]
    pub fn into_parts(self) -> (Vec<PathStep>, Solution) {
        (self.path, self.solution)
    }
}

/// Runs the match at `value` and then at every descendant, preorder. Each
/// position gets a fresh environment.
pub(crate) fn walk(
    cx: &mut Search<'_>,
    pat: &Pattern,
    value: &Value,
    path: &mut Vec<PathStep>,
    visit: &mut dyn FnMut(Found) -> ControlFlow<()>,
) -> Result<ControlFlow<()>, MatchError> {
    let env = Env::new();
    let flow = match_pattern(
        cx,
        pat,
        value,
        Site::Value,
        path,
        &env,
        &mut |cx, path, env| {
            Ok(visit(Found {
                path: path.clone(),
                solution: Solution::snapshot(env, cx.root),
            }))
        },
    )?;
    if flow.is_break() {
        return Ok(flow);
    }
    match value {
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(PathStep::Index(i));
                let walked = walk(cx, pat, item, path, visit);
                path.pop();
                let flow = walked?;
                if flow.is_break() {
                    return Ok(flow);
                }
            }
            Ok(ControlFlow::Continue(()))
        }
        Value::Mapping(pairs) => {
            for (key, item) in pairs {
                path.push(PathStep::Key(key.clone()));
                let walked = walk(cx, pat, item, path, visit);
                path.pop();
                let flow = walked?;
                if flow.is_break() {
                    return Ok(flow);
                }
            }
            Ok(ControlFlow::Continue(()))
        }
        _ => Ok(ControlFlow::Continue(())),
    }
}

#[cfg(test)]
mod tests {
    use crate::{render_path, Matcher, Pattern, Value};

    fn sample() -> Value {
        Value::mapping([
            (
                "a",
                Value::seq([Value::mapping([("b", Value::from(1))])]),
            ),
            ("c", Value::from(1)),
        ])
    }

    #[test]
    fn occurrences_come_in_preorder() {
        let m = Matcher::new(Pattern::literal(1)).unwrap();
        let found = m.find_all(&sample()).unwrap();
        let paths: Vec<String> = found.iter().map(|f| render_path(f.path())).collect();
        assert_eq!(paths, vec!["$.a[0].b", "$.c"]);
    }

    #[test]
    fn every_position_is_visited_including_the_root() {
        let m = Matcher::new(Pattern::Wildcard).unwrap();
        let found = m.find_all(&sample()).unwrap();
        let paths: Vec<String> = found.iter().map(|f| render_path(f.path())).collect();
        assert_eq!(paths, vec!["$", "$.a", "$.a[0]", "$.a[0].b", "$.c"]);
    }

    #[test]
    fn all_solutions_at_one_position_are_reported() {
        // Two groups over a two-element sequence admit three splits.
        let m = Matcher::new(Pattern::seq([
            Pattern::group_var("x"),
            Pattern::group_var("y"),
        ]))
        .unwrap();
        let v = Value::seq([Value::from("p"), Value::from("q")]);
        let found = m.find_all(&v).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|f| render_path(f.path()) == "$"));
    }

    #[test]
    fn find_first_stops_at_the_first_occurrence() {
        let m = Matcher::new(Pattern::literal(1)).unwrap();
        let first = m.find_first(&sample()).unwrap().unwrap();
        assert_eq!(render_path(first.path()), "$.a[0].b");
    }

    #[test]
    fn binding_paths_stay_rooted_at_the_search_root() {
        let m = Matcher::new(Pattern::seq([Pattern::var("x")])).unwrap();
        let v = Value::mapping([("xs", Value::seq([Value::from(9)]))]);
        let found = m.find_all(&v).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(render_path(found[0].path()), "$.xs");
        let binding = found[0].solution().binding("x").unwrap();
        assert_eq!(render_path(binding.path()), "$.xs[0]");
    }
}
