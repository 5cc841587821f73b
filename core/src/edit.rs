//! The edit planner: replaying solution bindings as structural edits on a
//! fresh copy of the input.
//!
//! Instructions address bindings by variable name. Each instruction produces
//! a replacement value per solution; what it replaces depends on the
//! binding's site: key-site bindings rename their mapping pair, value-site
//! bindings overwrite the bound position, group bindings splice the captured
//! region. Edits collected from every solution are applied deepest-first to
//! one copy, with a per-target last-write-wins policy.

use std::fmt;

use crate::env::{GroupRegion, Site, Solution};
use crate::trace_search;
use crate::value::{PathStep, Value};
use crate::EditError;

enum Instruction {
    Set(Value),
    Rename(String),
    With(Box<dyn Fn(&Solution) -> Value + Send + Sync>),
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Set(v) => f.debug_tuple("Set").field(v).finish(),
            Instruction::Rename(k) => f.debug_tuple("Rename").field(k).finish(),
            Instruction::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

/// A named set of edit instructions, one per variable.
///
/// # Example
///
/// ```
/// use treema::{apply_edits, Clause, Edits, Matcher, ObjectPattern, Pattern, Value};
///
/// let pattern = Pattern::Object(
///     ObjectPattern::new().clause(Clause::new(Pattern::var("k")).value(Pattern::literal(1))),
/// );
/// let root = Value::mapping([("a", Value::from(1)), ("b", Value::from(2))]);
///
/// let solutions = Matcher::new(pattern)?.solutions(&root)?;
/// let edited = apply_edits(&root, &solutions, &Edits::new().rename("k", "z"))?;
/// assert_eq!(edited, Value::mapping([("z", Value::from(1)), ("b", Value::from(2))]));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct Edits {
    instrs: Vec<(String, Instruction)>,
}

impl Edits {
    /// No instructions; applying yields an identity copy.
    #[must_use]
    pub fn new() -> Self {
        Edits::default()
    }

    /// Replaces whatever `name` is bound to with a constant value. On a
    /// key-site binding the value must be a string and renames the key.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.instrs
            .push((name.into(), Instruction::Set(value.into())));
        self
    }

    /// Renames the mapping key bound under `name`.
    #[must_use]
    pub fn rename(mut self, name: impl Into<String>, new_key: impl Into<String>) -> Self {
        self.instrs
            .push((name.into(), Instruction::Rename(new_key.into())));
        self
    }

    /// Computes the replacement from each solution.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Solution) -> Value + Send + Sync + 'static,
    {
        self.instrs
            .push((name.into(), Instruction::With(Box::new(f))));
        self
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Whether there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

#[derive(Debug, PartialEq)]
enum Planned {
    SetValue { path: Vec<PathStep>, value: Value },
    RenameKey { path: Vec<PathStep>, new_key: String },
    ReplaceRegion { region: GroupRegion, value: Value },
}

impl Planned {
    fn depth(&self) -> usize {
        match self {
            Planned::SetValue { path, .. } | Planned::RenameKey { path, .. } => path.len(),
            // Span and Keys edits land among the container's children; a
            // degenerate region is the captured node itself.
            Planned::ReplaceRegion { region, .. } => match region {
                GroupRegion::Single { at } => at.len(),
                _ => region.path().len() + 1,
            },
        }
    }

    /// Deterministic ordering position; regions order by their leftmost
    /// captured position.
    fn order_key(&self) -> Vec<PathStep> {
        match self {
            Planned::SetValue { path, .. } | Planned::RenameKey { path, .. } => path.clone(),
            Planned::ReplaceRegion { region, .. } => match region {
                GroupRegion::Span {
                    container, start, ..
                } => {
                    let mut key = container.clone();
                    key.push(PathStep::Index(*start));
                    key
                }
                GroupRegion::Keys { container, keys } => {
                    let mut key = container.clone();
                    key.push(PathStep::Key(keys.first().cloned().unwrap_or_default()));
                    key
                }
                GroupRegion::Single { at } => at.clone(),
            },
        }
    }

    /// At an equal target path, value writes land before renames so both
    /// can hit the same pair.
    fn kind_rank(&self) -> u8 {
        match self {
            Planned::SetValue { .. } => 0,
            Planned::ReplaceRegion { .. } => 1,
            Planned::RenameKey { .. } => 2,
        }
    }

    fn same_target(&self, other: &Planned) -> bool {
        match (self, other) {
            (Planned::SetValue { path: a, .. }, Planned::SetValue { path: b, .. })
            | (Planned::RenameKey { path: a, .. }, Planned::RenameKey { path: b, .. }) => a == b,
            (Planned::ReplaceRegion { region: a, .. }, Planned::ReplaceRegion { region: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

/// Applies `edits` across every solution to a fresh copy of `root`.
///
/// Edits are ordered deepest-path-first with a deterministic tiebreak, so a
/// child edit lands before any ancestor overwrite that would discard it.
/// When several solutions write the same target, the last solution's write
/// wins. With no instructions this is an identity copy.
///
/// # Errors
///
/// [`EditError::UnboundName`] when an instruction names a variable no
/// solution binds, [`EditError::KeyRenameNotString`] when a key-site
/// replacement is not a string.
pub fn apply_edits(
    root: &Value,
    solutions: &[Solution],
    edits: &Edits,
) -> Result<Value, EditError> {
    if edits.is_empty() {
        return Ok(root.clone());
    }
    for (name, _) in &edits.instrs {
        if !solutions.iter().any(|s| s.binding(name).is_some()) {
            return Err(EditError::UnboundName { name: name.clone() });
        }
    }

    let mut plans: Vec<Planned> = Vec::new();
    for solution in solutions {
        for (name, instr) in &edits.instrs {
            let Some(binding) = solution.binding(name) else {
                continue;
            };
            let replacement = match instr {
                Instruction::Set(v) => v.clone(),
                Instruction::Rename(k) => Value::from(k.as_str()),
                Instruction::With(f) => f(solution),
            };
            let plan = match binding.site() {
                Site::Key => {
                    let Value::String(new_key) = replacement else {
                        return Err(EditError::KeyRenameNotString {
                            name: name.clone(),
                            got: replacement.type_name(),
                        });
                    };
                    Planned::RenameKey {
                        path: binding.path().to_vec(),
                        new_key,
                    }
                }
                Site::Group => match &binding.region {
                    Some(region) => Planned::ReplaceRegion {
                        region: region.clone(),
                        value: replacement,
                    },
                    None => Planned::SetValue {
                        path: binding.path().to_vec(),
                        value: replacement,
                    },
                },
                Site::Value => Planned::SetValue {
                    path: binding.path().to_vec(),
                    value: replacement,
                },
            };
            // Last write wins per target.
            plans.retain(|p| !p.same_target(&plan));
            plans.push(plan);
        }
    }

    let mut keyed: Vec<(usize, Vec<PathStep>, Planned)> = plans
        .into_iter()
        .map(|p| (p.depth(), p.order_key(), p))
        .collect();
    keyed.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.kind_rank().cmp(&b.2.kind_rank()))
    });

    trace_search!(edits = keyed.len(), "applying edit plan");
    let mut out = root.clone();
    for (_, _, plan) in keyed {
        match plan {
            Planned::SetValue { path, value } => {
                // A path clobbered by an earlier (deeper or ancestor) edit
                // is simply gone; skip it.
                if let Some(slot) = out.at_mut(&path) {
                    *slot = value;
                }
            }
            Planned::RenameKey { path, new_key } => rename_key(&mut out, &path, new_key),
            Planned::ReplaceRegion { region, value } => replace_region(&mut out, &region, value),
        }
    }
    Ok(out)
}

fn rename_key(root: &mut Value, path: &[PathStep], new_key: String) {
    let Some((PathStep::Key(old_key), container_path)) = path.split_last() else {
        return;
    };
    let Some(Value::Mapping(pairs)) = root.at_mut(container_path) else {
        return;
    };
    // A pair already holding the new name is overwritten by the rename.
    if new_key != *old_key {
        pairs.retain(|(k, _)| k != &new_key);
    }
    if let Some(pair) = pairs.iter_mut().find(|(k, _)| k == old_key) {
        pair.0 = new_key;
    }
}

fn replace_region(root: &mut Value, region: &GroupRegion, value: Value) {
    match region {
        GroupRegion::Span {
            container,
            start,
            end,
        } => {
            let Some(Value::Sequence(items)) = root.at_mut(container) else {
                return;
            };
            let start = (*start).min(items.len());
            let end = (*end).min(items.len()).max(start);
            let replacement = match value {
                Value::Sequence(els) => els,
                other => vec![other],
            };
            items.splice(start..end, replacement);
        }
        GroupRegion::Keys { container, keys } => {
            let Some(Value::Mapping(pairs)) = root.at_mut(container) else {
                return;
            };
            // A non-mapping replacement just removes the captured pairs.
            let incoming: Vec<(String, Value)> = match value {
                Value::Mapping(new_pairs) => new_pairs,
                _ => Vec::new(),
            };
            let survives = |k: &String| {
                !keys.iter().any(|w| w == k) && !incoming.iter().any(|(nk, _)| nk == k)
            };
            let insert_at = pairs.iter().position(|(k, _)| keys.iter().any(|w| w == k));
            let at = match insert_at {
                Some(i) => pairs[..i].iter().filter(|(k, _)| survives(k)).count(),
                None => pairs.len(),
            };
            pairs.retain(|(k, _)| survives(k));
            let at = at.min(pairs.len());
            pairs.splice(at..at, incoming);
        }
        GroupRegion::Single { at } => {
            if let Some(slot) = root.at_mut(at) {
                *slot = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clause, Matcher, ObjectPattern, Pattern};

    fn clause_obj(clause: Clause) -> Pattern {
        Pattern::Object(ObjectPattern::new().clause(clause))
    }

    fn solve(pattern: Pattern, root: &Value) -> Vec<Solution> {
        Matcher::new(pattern).unwrap().solutions(root).unwrap()
    }

    #[test]
    fn no_instructions_is_an_identity_copy() {
        let root = Value::mapping([("a", Value::seq([Value::from(1)]))]);
        let out = apply_edits(&root, &[], &Edits::new()).unwrap();
        assert_eq!(out, root);
    }

    #[test]
    fn key_rename_keeps_the_pair_position() {
        let root = Value::mapping([("a", Value::from(1)), ("b", Value::from(2))]);
        let sols = solve(
            clause_obj(Clause::new(Pattern::var("k")).value(Pattern::literal(1))),
            &root,
        );
        let out = apply_edits(&root, &sols, &Edits::new().rename("k", "z")).unwrap();
        assert_eq!(
            out,
            Value::mapping([("z", Value::from(1)), ("b", Value::from(2))])
        );
    }

    #[test]
    fn rename_collision_overwrites_the_existing_pair() {
        let root = Value::mapping([("a", Value::from(1)), ("z", Value::from(9))]);
        let sols = solve(
            clause_obj(Clause::new(Pattern::var("k")).value(Pattern::literal(1))),
            &root,
        );
        let out = apply_edits(&root, &sols, &Edits::new().rename("k", "z")).unwrap();
        assert_eq!(out, Value::mapping([("z", Value::from(1))]));
    }

    #[test]
    fn value_set_applies_in_every_solution() {
        let root = Value::mapping([("a", Value::from(1)), ("b", Value::from(2))]);
        let sols = solve(
            clause_obj(Clause::new(Pattern::var("k")).value(Pattern::var("v"))),
            &root,
        );
        assert_eq!(sols.len(), 2);
        let out = apply_edits(&root, &sols, &Edits::new().set("v", 0)).unwrap();
        assert_eq!(
            out,
            Value::mapping([("a", Value::from(0)), ("b", Value::from(0))])
        );
    }

    #[test]
    fn set_and_rename_can_hit_the_same_pair() {
        let root = Value::mapping([("a", Value::from(1))]);
        let sols = solve(
            clause_obj(Clause::new(Pattern::var("k")).value(Pattern::var("v"))),
            &root,
        );
        let out = apply_edits(
            &root,
            &sols,
            &Edits::new().rename("k", "z").set("v", 42),
        )
        .unwrap();
        assert_eq!(out, Value::mapping([("z", Value::from(42))]));
    }

    #[test]
    fn group_spans_splice_their_region() {
        let root = Value::seq([
            Value::from("a"),
            Value::from("b"),
            Value::from("c"),
            Value::from("z"),
        ]);
        let pattern = Pattern::seq([
            Pattern::literal("a"),
            Pattern::group_var("mid"),
            Pattern::literal("z"),
        ]);
        let sols = solve(pattern, &root);
        assert_eq!(sols.len(), 1);

        let swapped = apply_edits(
            &root,
            &sols,
            &Edits::new().set("mid", Value::seq([Value::from("X")])),
        )
        .unwrap();
        assert_eq!(
            swapped,
            Value::seq([Value::from("a"), Value::from("X"), Value::from("z")])
        );

        // A scalar replacement becomes a single element; an empty sequence
        // deletes the region.
        let single = apply_edits(&root, &sols, &Edits::new().set("mid", "Y")).unwrap();
        assert_eq!(
            single,
            Value::seq([Value::from("a"), Value::from("Y"), Value::from("z")])
        );
        let gone = apply_edits(&root, &sols, &Edits::new().set("mid", Value::seq([]))).unwrap();
        assert_eq!(gone, Value::seq([Value::from("a"), Value::from("z")]));
    }

    #[test]
    fn sibling_spans_splice_right_to_left() {
        let root = Value::seq([Value::from("x"), Value::from("|"), Value::from("y")]);
        let pattern = Pattern::seq([
            Pattern::group_var("a"),
            Pattern::literal("|"),
            Pattern::group_var("b"),
        ]);
        let sols = solve(pattern, &root);
        assert_eq!(sols.len(), 1);

        let out = apply_edits(
            &root,
            &sols,
            &Edits::new()
                .set("a", Value::seq([]))
                .set("b", Value::seq([Value::from("B1"), Value::from("B2")])),
        )
        .unwrap();
        assert_eq!(
            out,
            Value::seq([Value::from("|"), Value::from("B1"), Value::from("B2")])
        );
    }

    #[test]
    fn residual_group_replacement_splices_pairs() {
        let root = Value::mapping([
            ("keep", Value::from(1)),
            ("x", Value::from(2)),
            ("y", Value::from(3)),
        ]);
        let pattern = Pattern::Object(
            ObjectPattern::new()
                .clause(Clause::new(Pattern::literal("keep")))
                .residual(crate::Residual::new().bind("rest")),
        );
        let sols = solve(pattern, &root);
        assert_eq!(sols.len(), 1);

        let replaced = apply_edits(
            &root,
            &sols,
            &Edits::new().set("rest", Value::mapping([("n", Value::from(5))])),
        )
        .unwrap();
        assert_eq!(
            replaced,
            Value::mapping([("keep", Value::from(1)), ("n", Value::from(5))])
        );

        let removed = apply_edits(&root, &sols, &Edits::new().set("rest", Value::Null)).unwrap();
        assert_eq!(removed, Value::mapping([("keep", Value::from(1))]));
    }

    #[test]
    fn child_edits_land_before_an_ancestor_overwrite() {
        let root = Value::mapping([("a", Value::mapping([("b", Value::from(1))]))]);
        let pattern = clause_obj(Clause::new(Pattern::literal("a")).value(Pattern::bind(
            "outer",
            clause_obj(Clause::new(Pattern::literal("b")).value(Pattern::var("inner"))),
        )));
        let sols = solve(pattern, &root);
        assert_eq!(sols.len(), 1);

        let out = apply_edits(
            &root,
            &sols,
            &Edits::new()
                .set("inner", 99)
                .set("outer", Value::mapping([("fresh", Value::from(0))])),
        )
        .unwrap();
        // The ancestor overwrite governs; the child edit applied first and
        // was then replaced wholesale.
        assert_eq!(
            out,
            Value::mapping([("a", Value::mapping([("fresh", Value::from(0))]))])
        );
    }

    #[test]
    fn same_target_takes_the_last_solutions_write() {
        let root = Value::mapping([("a", Value::from(1)), ("tag", Value::from("B"))]);
        let sols_a = solve(
            clause_obj(Clause::new(Pattern::literal("a")).value(Pattern::var("x"))),
            &root,
        );
        let sols_b = solve(
            Pattern::Object(
                ObjectPattern::new()
                    .clause(Clause::new(Pattern::literal("a")).value(Pattern::var("x")))
                    .clause(Clause::new(Pattern::literal("tag")).value(Pattern::var("t"))),
            ),
            &root,
        );
        let mut solutions = sols_a;
        solutions.extend(sols_b);
        assert_eq!(solutions.len(), 2);

        let edits = Edits::new().with("x", |s| {
            if s.get("t").is_some() {
                Value::from("from B")
            } else {
                Value::from("from A")
            }
        });
        let out = apply_edits(&root, &solutions, &edits).unwrap();
        assert_eq!(out.get("a"), Some(&Value::from("from B")));
    }

    #[test]
    fn unknown_instruction_name_is_a_usage_error() {
        let root = Value::mapping([("a", Value::from(1))]);
        let sols = solve(
            clause_obj(Clause::new(Pattern::var("k")).value(Pattern::literal(1))),
            &root,
        );
        let err = apply_edits(&root, &sols, &Edits::new().set("nope", 1));
        assert!(matches!(err, Err(EditError::UnboundName { name }) if name == "nope"));
    }

    #[test]
    fn key_rename_demands_a_string() {
        let root = Value::mapping([("a", Value::from(1))]);
        let sols = solve(
            clause_obj(Clause::new(Pattern::var("k")).value(Pattern::literal(1))),
            &root,
        );
        let err = apply_edits(&root, &sols, &Edits::new().set("k", 5));
        assert!(matches!(
            err,
            Err(EditError::KeyRenameNotString { got, .. }) if got == "number"
        ));
    }

    #[test]
    fn degenerate_group_bindings_overwrite_in_place() {
        let root = Value::mapping([("a", Value::from(1))]);
        // A group variable at a value position captures a one-element group.
        let sols = solve(
            clause_obj(Clause::new(Pattern::literal("a")).value(Pattern::group_var("g"))),
            &root,
        );
        assert_eq!(sols.len(), 1);
        let out = apply_edits(&root, &sols, &Edits::new().set("g", 7)).unwrap();
        assert_eq!(out, Value::mapping([("a", Value::from(7))]));
    }

    #[test]
    fn same_node_scalar_and_degenerate_group_writes_rank_by_kind() {
        let root = Value::mapping([("a", Value::from(1))]);
        // One alternation arm binds the value as a scalar, the other as a
        // degenerate group. Both edits target the same node at the same
        // depth, so the region write ranks after the value write and lands
        // last.
        let sols = solve(
            clause_obj(Clause::new(Pattern::literal("a")).value(Pattern::alt(
                Pattern::var("x"),
                Pattern::group_var("g"),
            ))),
            &root,
        );
        assert_eq!(sols.len(), 2);
        let out = apply_edits(
            &root,
            &sols,
            &Edits::new().set("x", "scalar").set("g", "region"),
        )
        .unwrap();
        assert_eq!(out, Value::mapping([("a", Value::from("region"))]));
    }
}
