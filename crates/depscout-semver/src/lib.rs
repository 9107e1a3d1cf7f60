//! Semantic versioning library for npm-style version ranges
//!
//! This crate provides version parsing, comparison, and range matching for
//! the dialect of semver ranges found in npm package manifests: caret and
//! tilde ranges, comparator chains, wildcards, and `||` alternatives.

mod range;
mod version;

pub use range::{best_match, Comparator, Range, RangeError};
pub use version::Version;

/// Parse a range expression.
pub fn parse(input: &str) -> Result<Range, RangeError> {
    Range::parse(input)
}

/// Check if a version string satisfies a range expression.
///
/// Total: any parse failure on either side yields `false`.
pub fn satisfies(range: &str, version: &str) -> bool {
    let range = match Range::parse(range) {
        Ok(r) => r,
        Err(_) => return false,
    };

    let version = match Version::parse(version) {
        Ok(v) => v,
        Err(_) => return false,
    };

    range.satisfies(&version)
}
