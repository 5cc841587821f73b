//! Conformance test fixture runner.
//!
//! A fixture is one pattern plus a list of input cases, loaded from YAML.
//! Each case pins down what the engine must produce for that input: the
//! solution maps, their count, occurrence paths under `find`, the edited
//! output, or a resource error.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use treema::{
    apply_edits, render_path, Edits, MatchError, MatchOptions, Matcher, PatternError, PatternSpec,
    Solution, Value,
};

/// A complete test fixture.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pattern: PatternSpec,
    #[serde(default)]
    pub options: Option<OptionsSpec>,
    pub cases: Vec<TestCase>,
}

/// Resource limits from YAML; omitted fields keep the engine defaults.
#[derive(Debug, Default, Deserialize)]
pub struct OptionsSpec {
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
}

impl OptionsSpec {
    fn build(&self) -> MatchOptions {
        let mut opts = MatchOptions::new();
        if let Some(depth) = self.max_depth {
            opts = opts.with_max_depth(depth);
        }
        if let Some(steps) = self.max_steps {
            opts = opts.with_max_steps(steps);
        }
        if let Some(ms) = self.time_budget_ms {
            opts = opts.with_time_budget(Duration::from_millis(ms));
        }
        opts
    }
}

/// One input with its expected outcome.
///
/// Expectations are additive: a case may pin any combination of `solutions`,
/// `count`, `paths`, `output`, and `error`, and every present one is checked.
/// A case with no expectations at all is reported as a failure.
#[derive(Debug, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub input: Value,
    /// Search every position of the input instead of matching the root only.
    #[serde(default)]
    pub find: bool,
    /// Expected solutions in enumeration order, as full name-to-value maps.
    #[serde(default)]
    pub solutions: Option<Vec<BTreeMap<String, Value>>>,
    /// Expected number of solutions (occurrences under `find`).
    #[serde(default)]
    pub count: Option<usize>,
    /// Expected occurrence paths under `find`, rendered like `$.items[2]`.
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    /// Edit instructions to apply over all solutions.
    #[serde(default)]
    pub edits: Option<Vec<EditSpec>>,
    /// Expected tree after applying `edits`.
    #[serde(default)]
    pub output: Option<Value>,
    /// Expected resource error instead of a result.
    #[serde(default)]
    pub error: Option<ErrorKind>,
}

/// One edit instruction: exactly one of `set` or `rename`.
#[derive(Debug, Deserialize)]
pub struct EditSpec {
    /// The bound variable the instruction targets.
    pub name: String,
    #[serde(default)]
    pub set: Option<Value>,
    #[serde(default)]
    pub rename: Option<String>,
}

impl EditSpec {
    fn add_to(&self, edits: Edits) -> Result<Edits, String> {
        match (&self.set, &self.rename) {
            (Some(value), None) => Ok(edits.set(self.name.clone(), value.clone())),
            (None, Some(key)) => Ok(edits.rename(self.name.clone(), key.clone())),
            _ => Err(format!(
                "edit for '{}' must have exactly one of set/rename",
                self.name
            )),
        }
    }
}

/// The resource error kinds a case may expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Depth,
    Budget,
    Deadline,
}

impl ErrorKind {
    fn matches(self, err: &MatchError) -> bool {
        matches!(
            (self, err),
            (ErrorKind::Depth, MatchError::DepthExceeded { .. })
                | (ErrorKind::Budget, MatchError::BudgetExceeded { .. })
                | (ErrorKind::Deadline, MatchError::DeadlineExceeded { .. })
        )
    }
}

/// Result of running a single test case.
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    /// What went wrong, for failed cases.
    pub detail: Option<String>,
}

fn binding_map(solution: &Solution) -> BTreeMap<String, Value> {
    solution
        .iter()
        .map(|(name, binding)| (name.to_owned(), binding.value().clone()))
        .collect()
}

impl Fixture {
    /// Parse a fixture from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators.
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    /// Compile the fixture's pattern with its configured limits.
    pub fn build_matcher(&self) -> Result<Matcher, PatternError> {
        let pattern = self.pattern.compile()?;
        match &self.options {
            Some(spec) => Matcher::with_options(pattern, spec.build()),
            None => Matcher::new(pattern),
        }
    }

    /// Run all test cases and return their results.
    pub fn run(&self) -> Result<Vec<CaseResult>, PatternError> {
        let matcher = self.build_matcher()?;
        Ok(self
            .cases
            .iter()
            .map(|case| {
                let outcome = case.check(&matcher);
                CaseResult {
                    case_name: case.name.clone(),
                    passed: outcome.is_ok(),
                    detail: outcome.err(),
                }
            })
            .collect())
    }

    /// Run all test cases and panic on the first failure.
    pub fn run_and_assert(&self) {
        let results = match self.run() {
            Ok(results) => results,
            Err(err) => panic!("Fixture '{}': pattern failed to compile: {err}", self.name),
        };
        for result in results {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: {}",
                self.name,
                result.case_name,
                result.detail.as_deref().unwrap_or("unknown"),
            );
        }
    }
}

impl TestCase {
    fn has_expectations(&self) -> bool {
        self.solutions.is_some()
            || self.count.is_some()
            || self.paths.is_some()
            || self.output.is_some()
            || self.error.is_some()
    }

    fn check(&self, matcher: &Matcher) -> Result<(), String> {
        if !self.has_expectations() {
            return Err("case asserts nothing; add solutions, count, paths, output, or error".into());
        }
        if self.find {
            return self.check_find(matcher);
        }

        let solutions = match (matcher.solutions(&self.input), self.error) {
            (Err(err), Some(kind)) if kind.matches(&err) => return Ok(()),
            (Err(err), Some(kind)) => return Err(format!("expected a {kind:?} error, got: {err}")),
            (Err(err), None) => return Err(format!("match failed: {err}")),
            (Ok(_), Some(kind)) => return Err(format!("expected a {kind:?} error, got a result")),
            (Ok(solutions), None) => solutions,
        };

        if let Some(expected) = self.count {
            if solutions.len() != expected {
                return Err(format!(
                    "expected {expected} solutions, got {}",
                    solutions.len()
                ));
            }
        }
        if let Some(expected) = &self.solutions {
            let actual: Vec<BTreeMap<String, Value>> = solutions.iter().map(binding_map).collect();
            if actual != *expected {
                return Err(format!(
                    "solutions differ\n  expected: {expected:?}\n  actual:   {actual:?}"
                ));
            }
        }
        if self.paths.is_some() {
            return Err("path expectations require find: true".into());
        }

        if let Some(specs) = &self.edits {
            let mut edits = Edits::new();
            for spec in specs {
                edits = spec.add_to(edits)?;
            }
            let edited = apply_edits(&self.input, &solutions, &edits)
                .map_err(|err| format!("edit failed: {err}"))?;
            if let Some(expected) = &self.output {
                if edited != *expected {
                    return Err(format!(
                        "output differs\n  expected: {expected}\n  actual:   {edited}"
                    ));
                }
            }
        } else if self.output.is_some() {
            return Err("output expectation requires edits".into());
        }
        Ok(())
    }

    fn check_find(&self, matcher: &Matcher) -> Result<(), String> {
        let found = match (matcher.find_all(&self.input), self.error) {
            (Err(err), Some(kind)) if kind.matches(&err) => return Ok(()),
            (Err(err), Some(kind)) => return Err(format!("expected a {kind:?} error, got: {err}")),
            (Err(err), None) => return Err(format!("find failed: {err}")),
            (Ok(_), Some(kind)) => return Err(format!("expected a {kind:?} error, got a result")),
            (Ok(found), None) => found,
        };

        if let Some(expected) = self.count {
            if found.len() != expected {
                return Err(format!(
                    "expected {expected} occurrences, got {}",
                    found.len()
                ));
            }
        }
        if let Some(expected) = &self.paths {
            let actual: Vec<String> = found.iter().map(|f| render_path(f.path())).collect();
            if actual != *expected {
                return Err(format!(
                    "paths differ\n  expected: {expected:?}\n  actual:   {actual:?}"
                ));
            }
        }
        if let Some(expected) = &self.solutions {
            let actual: Vec<BTreeMap<String, Value>> =
                found.iter().map(|f| binding_map(f.solution())).collect();
            if actual != *expected {
                return Err(format!(
                    "solutions differ\n  expected: {expected:?}\n  actual:   {actual:?}"
                ));
            }
        }
        if self.edits.is_some() || self.output.is_some() {
            return Err("edit expectations only apply to root matches, not find".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_minimal_fixture_parses_and_passes() {
        let fixture = Fixture::from_yaml(
            r#"
name: smoke
pattern:
  type: seq
  items:
    - { type: literal, value: get }
    - { type: var, name: key }
cases:
  - name: two elements match
    input: [get, alpha]
    solutions:
      - { key: alpha }
  - name: wrong head
    input: [put, alpha]
    count: 0
"#,
        )
        .unwrap();
        fixture.run_and_assert();
    }

    #[test]
    fn failures_carry_a_detail_message() {
        let fixture = Fixture::from_yaml(
            r#"
name: wrong count
pattern: { type: wildcard }
cases:
  - name: expects too many
    input: 1
    count: 2
"#,
        )
        .unwrap();
        let results = fixture.run().unwrap();
        assert!(!results[0].passed);
        assert!(results[0].detail.as_deref().unwrap().contains("expected 2"));
    }

    #[test]
    fn multi_document_files_hold_several_fixtures() {
        let fixtures = Fixture::from_yaml_multi(
            "name: a\npattern: { type: wildcard }\ncases: []\n---\nname: b\npattern: { type: wildcard }\ncases: []\n",
        )
        .unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].name, "a");
        assert_eq!(fixtures[1].name, "b");
    }

    #[test]
    fn an_edit_spec_needs_exactly_one_instruction() {
        let fixture = Fixture::from_yaml(
            r#"
name: bad edit
pattern: { type: var, name: x }
cases:
  - name: neither set nor rename
    input: 1
    edits:
      - { name: x }
    output: 1
"#,
        )
        .unwrap();
        let results = fixture.run().unwrap();
        assert!(!results[0].passed);
        assert!(results[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("exactly one of set/rename"));
    }

    #[test]
    fn error_cases_match_their_kind() {
        let fixture = Fixture::from_yaml(
            r#"
name: budget
pattern:
  type: seq
  items:
    - { type: group, name: a }
    - { type: group, name: b }
    - { type: literal, value: absent }
options:
  max_steps: 5
cases:
  - name: runs out of steps
    input: [1, 2, 3, 4, 5, 6, 7, 8]
    error: budget
"#,
        )
        .unwrap();
        fixture.run_and_assert();

        let wrong_kind = Fixture::from_yaml(
            r#"
name: budget expected as depth
pattern:
  type: seq
  items:
    - { type: group, name: a }
    - { type: group, name: b }
    - { type: literal, value: absent }
options:
  max_steps: 5
cases:
  - name: wrong kind
    input: [1, 2, 3, 4, 5, 6, 7, 8]
    error: depth
"#,
        )
        .unwrap();
        let results = wrong_kind.run().unwrap();
        assert!(!results[0].passed);
    }

    #[test]
    fn a_zero_time_budget_surfaces_as_a_deadline() {
        // Enough elements that the search reaches a clock sample before
        // it can finish enumerating splits.
        let fixture = Fixture::from_yaml(
            r#"
name: deadline
pattern:
  type: seq
  items:
    - { type: group, name: a }
    - { type: group, name: b }
options:
  time_budget_ms: 0
cases:
  - name: runs out of time
    input: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
    error: deadline
"#,
        )
        .unwrap();
        fixture.run_and_assert();
    }

    #[test]
    fn a_case_without_expectations_is_rejected() {
        let fixture = Fixture::from_yaml(
            r#"
name: vacuous
pattern: { type: wildcard }
cases:
  - name: asserts nothing
    input: 1
"#,
        )
        .unwrap();
        let results = fixture.run().unwrap();
        assert!(!results[0].passed);
        assert!(results[0].detail.as_deref().unwrap().contains("asserts nothing"));
    }

    #[test]
    fn compile_failures_surface_from_run() {
        let fixture = Fixture::from_yaml(
            r#"
name: broken pattern
pattern: { type: regex, pattern: "(" }
cases: []
"#,
        )
        .unwrap();
        assert!(fixture.run().is_err());
    }
}
