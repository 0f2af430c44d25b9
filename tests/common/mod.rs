//! Shared helpers for integration tests
//!
//! Fixtures live in `tests/fixtures/`; outputs go to a `tempfile::TempDir`
//! that is removed when the test ends.

#![allow(dead_code)]

use std::path::PathBuf;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("output file should exist")
        .lines()
        .map(str::to_string)
        .collect()
}
