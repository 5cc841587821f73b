//! Bindings, unification, and solution snapshots.
//!
//! An [`Env`] is the branch-local store the search threads through a match
//! attempt. It is never mutated in place: `bind_scalar` / `bind_group`
//! return a fresh environment on success and `None` on a unification
//! failure, so sibling branches can never observe each other's bindings.
//!
//! Group captures are stored as [`GroupRegion`] references into the input
//! tree (container path plus span or key subset), not as copies; they are
//! materialized lazily for unification checks and once more when a
//! [`Solution`] is snapshot at yield time.

use std::fmt;

use crate::value::{PathStep, Value};

/// Where a binding was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Site {
    /// A value position.
    Value,
    /// A mapping key (the bound value is the key string).
    Key,
    /// A region capture: an element run or a key subset.
    Group,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Site::Value => "value",
            Site::Key => "key",
            Site::Group => "group",
        })
    }
}

/// A live reference to the region a group captured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum GroupRegion {
    /// Elements `start..end` of the sequence at `container`.
    Span {
        container: Vec<PathStep>,
        start: usize,
        end: usize,
    },
    /// The pairs of the mapping at `container` whose keys are listed, in the
    /// mapping's own pair order.
    Keys {
        container: Vec<PathStep>,
        keys: Vec<String>,
    },
    /// A degenerate one-element group at a value position.
    Single { at: Vec<PathStep> },
}

impl GroupRegion {
    /// The container path (for `Single`, the value's own path).
    pub(crate) fn path(&self) -> &[PathStep] {
        match self {
            GroupRegion::Span { container, .. } | GroupRegion::Keys { container, .. } => container,
            GroupRegion::Single { at } => at,
        }
    }

    /// Materializes the captured region against the root the search ran on.
    ///
    /// Returns `None` only if the region no longer resolves, which cannot
    /// happen while the root it was built from is still the one supplied.
    pub(crate) fn resolve(&self, root: &Value) -> Option<Value> {
        match self {
            GroupRegion::Span {
                container,
                start,
                end,
            } => {
                let items = root.at(container)?.as_sequence()?;
                Some(Value::Sequence(items.get(*start..*end)?.to_vec()))
            }
            GroupRegion::Keys { container, keys } => {
                let pairs = root.at(container)?.as_mapping()?;
                Some(Value::Mapping(
                    pairs
                        .iter()
                        .filter(|(k, _)| keys.iter().any(|want| want == k))
                        .cloned()
                        .collect(),
                ))
            }
            GroupRegion::Single { at } => {
                Some(Value::Sequence(vec![root.at(at)?.clone()]))
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Captured {
    Scalar(Value),
    Group(GroupRegion),
}

#[derive(Clone, Debug)]
struct Slot {
    site: Site,
    path: Vec<PathStep>,
    captured: Captured,
}

/// Branch-local variable store. Cheap to clone; cloned on every successful
/// bind so the caller's environment is never disturbed.
#[derive(Clone, Debug, Default)]
pub(crate) struct Env {
    slots: Vec<(String, Slot)>,
}

impl Env {
    pub(crate) fn new() -> Self {
        Env::default()
    }

    fn find(&self, name: &str) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot)
    }

    fn updated(&self, name: &str, update: impl FnOnce(&mut Slot)) -> Env {
        let mut next = self.clone();
        if let Some((_, slot)) = next.slots.iter_mut().find(|(n, _)| n == name) {
            update(slot);
        }
        next
    }

    fn inserted(&self, name: &str, slot: Slot) -> Env {
        let mut next = self.clone();
        next.slots.push((name.to_owned(), slot));
        next
    }

    /// Binds `name` to a single value at `path`.
    ///
    /// Fails (returns `None`) on a scalar/group kind conflict or when an
    /// existing binding is structurally unequal. On an equal re-binding the
    /// deepest occurrence's path and site win.
    pub(crate) fn bind_scalar(
        &self,
        name: &str,
        value: &Value,
        path: &[PathStep],
        site: Site,
    ) -> Option<Env> {
        match self.find(name) {
            None => Some(self.inserted(
                name,
                Slot {
                    site,
                    path: path.to_vec(),
                    captured: Captured::Scalar(value.clone()),
                },
            )),
            Some(slot) => match &slot.captured {
                Captured::Group(_) => None,
                Captured::Scalar(existing) if existing == value => {
                    if path.len() >= slot.path.len() {
                        Some(self.updated(name, |slot| {
                            slot.path = path.to_vec();
                            slot.site = site;
                        }))
                    } else {
                        Some(self.clone())
                    }
                }
                Captured::Scalar(_) => None,
            },
        }
    }

    /// Binds `name` to a captured region.
    ///
    /// Unification materializes both regions against `root` and compares
    /// them structurally; kind conflicts and unequal regions fail.
    pub(crate) fn bind_group(
        &self,
        name: &str,
        region: GroupRegion,
        root: &Value,
    ) -> Option<Env> {
        match self.find(name) {
            None => {
                let path = region.path().to_vec();
                Some(self.inserted(
                    name,
                    Slot {
                        site: Site::Group,
                        path,
                        captured: Captured::Group(region),
                    },
                ))
            }
            Some(slot) => match &slot.captured {
                Captured::Scalar(_) => None,
                Captured::Group(existing) => {
                    let old = existing.resolve(root)?;
                    let new = region.resolve(root)?;
                    if old != new {
                        return None;
                    }
                    if region.path().len() >= slot.path.len() {
                        Some(self.updated(name, |slot| {
                            slot.path = region.path().to_vec();
                            slot.captured = Captured::Group(region);
                        }))
                    } else {
                        Some(self.clone())
                    }
                }
            },
        }
    }

    /// The value bound to a scalar variable, for resolving breadcrumb steps
    /// that name an already-bound variable.
    pub(crate) fn scalar(&self, name: &str) -> Option<&Value> {
        match &self.find(name)?.captured {
            Captured::Scalar(value) => Some(value),
            Captured::Group(_) => None,
        }
    }

    /// Snapshot iteration used by [`Solution::snapshot`].
    fn entries(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.slots.iter().map(|(n, slot)| (n.as_str(), slot))
    }
}

/// One variable's record inside a [`Solution`].
#[derive(Clone, Debug)]
pub struct Binding {
    site: Site,
    path: Vec<PathStep>,
    value: Value,
    pub(crate) region: Option<GroupRegion>,
}

impl Binding {
    /// The bound value. Group bindings are materialized: element runs as a
    /// `Sequence`, key subsets as a `Mapping`, degenerate groups as a
    /// one-element `Sequence`.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Where the binding was recorded.
    #[inline]
    #[must_use]
    pub fn site(&self) -> Site {
        self.site
    }

    /// Path of the binding: the bound position, or the container for groups.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[PathStep] {
        &self.path
    }
}

/// A completed, immutable set of bindings yielded by the engine.
#[derive(Clone, Debug, Default)]
pub struct Solution {
    bindings: Vec<(String, Binding)>,
}

impl Solution {
    pub(crate) fn snapshot(env: &Env, root: &Value) -> Self {
        let bindings = env
            .entries()
            .map(|(name, slot)| {
                let binding = match &slot.captured {
                    Captured::Scalar(value) => Binding {
                        site: slot.site,
                        path: slot.path.clone(),
                        value: value.clone(),
                        region: None,
                    },
                    Captured::Group(region) => Binding {
                        site: Site::Group,
                        path: slot.path.clone(),
                        // A live region always resolves against its own root.
                        value: region.resolve(root).unwrap_or(Value::Null),
                        region: Some(region.clone()),
                    },
                };
                (name.to_owned(), binding)
            })
            .collect();
        Solution { bindings }
    }

    /// The value bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.binding(name).map(Binding::value)
    }

    /// The full binding record for `name`.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    /// Bound names, in first-bound order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(n, _)| n.as_str())
    }

    /// Iterates `(name, binding)` pairs in first-bound order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(n, b)| (n.as_str(), b))
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the solution binds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
