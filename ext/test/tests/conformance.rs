//! Conformance tests that run the YAML fixtures under `fixtures/`.
//!
//! Run with: cargo test -p treema-test --test conformance

use std::fs;
use std::path::{Path, PathBuf};
use treema_test::fixture::Fixture;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Load and run all fixtures in a directory, in file-name order.
fn run_fixtures_in_dir(dir: &Path) {
    let entries = fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("fixtures directory {}: {e}", dir.display()));
    let mut paths: Vec<PathBuf> = entries
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|e| e == "yaml" || e == "yml"))
        .collect();
    paths.sort();
    assert!(!paths.is_empty(), "no fixtures under {}", dir.display());

    for path in paths {
        println!("Running fixture file: {}", path.display());

        let yaml = fs::read_to_string(&path).expect("read yaml");

        // Parse potentially multiple fixtures (separated by ---)
        let fixtures = Fixture::from_yaml_multi(&yaml)
            .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()));

        for fixture in fixtures {
            println!("  Running: {}", fixture.name);
            fixture.run_and_assert();
        }
    }
}

#[test]
fn sequences() {
    run_fixtures_in_dir(&fixtures_dir().join("01_sequences"));
}

#[test]
fn objects() {
    run_fixtures_in_dir(&fixtures_dir().join("02_objects"));
}

#[test]
fn unification() {
    run_fixtures_in_dir(&fixtures_dir().join("03_unification"));
}

#[test]
fn find() {
    run_fixtures_in_dir(&fixtures_dir().join("04_find"));
}

#[test]
fn edits() {
    run_fixtures_in_dir(&fixtures_dir().join("05_edits"));
}

#[test]
fn resource_limits() {
    run_fixtures_in_dir(&fixtures_dir().join("06_resources"));
}
