//! Range expression parsing and matching
//!
//! Grammar: `||`-separated alternatives, each a conjunction of atoms. An
//! atom is a wildcard, a caret or tilde range, a comparator, or an exact
//! version pattern. Conjunction is written with whitespace or `&&`; a new
//! operator token starting mid-string also opens a new atom, so
//! `>=1.2.3<2.0.0` parses the same as `>=1.2.3 <2.0.0`.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::version::Version;

lazy_static! {
    // A bare wildcard atom
    static ref WILDCARD_RE: Regex = Regex::new(r"^[xX*]$").unwrap();

    // Version token inside an atom: leading digits, then up to two more
    // components that may each be a wildcard. Pre-release/build tails are
    // stripped before this regex runs.
    static ref ATOM_VERSION_RE: Regex =
        Regex::new(r"^[vV]?(\d+)(?:\.(\d+|[xX*]))?(?:\.(\d+|[xX*]))?$").unwrap();
}

/// Error type for range parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("could not parse range \"{range}\": {reason}")]
    InvalidRange { range: String, reason: String },
}

impl RangeError {
    fn range(range: &str, reason: impl Into<String>) -> Self {
        RangeError::InvalidRange {
            range: range.to_string(),
            reason: reason.into(),
        }
    }
}

/// One component of an exact version pattern: a written number, or a
/// wildcard (written `x`/`X`/`*`, or simply omitted).
pub type PatternPart = Option<u64>;

/// A single atom of a range conjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    /// `*`, `x`, `X`: matches everything
    Any,
    /// `X.Y.Z` with wildcards for unwritten components
    Exact([PatternPart; 3]),
    /// `^X.Y.Z`
    Caret(Version),
    /// `~X.Y.Z`; `precision` is the number of written numeric components
    Tilde { base: Version, precision: u8 },
    GreaterThan(Version),
    GreaterThanOrEqual(Version),
    LessThan(Version),
    LessThanOrEqual(Version),
}

impl Comparator {
    /// Check whether a concrete version matches this atom.
    pub fn matches(&self, v: &Version) -> bool {
        match self {
            Comparator::Any => true,
            Comparator::Exact(parts) => {
                let triple = [v.major, v.minor, v.patch];
                parts
                    .iter()
                    .zip(triple.iter())
                    .all(|(part, actual)| part.map_or(true, |n| n == *actual))
            }
            Comparator::Caret(base) => *v >= *base && *v < caret_upper(base),
            Comparator::Tilde { base, precision } => {
                let upper = if *precision <= 1 {
                    base.next_major()
                } else {
                    base.next_minor()
                };
                *v >= *base && *v < upper
            }
            Comparator::GreaterThan(bound) => v > bound,
            Comparator::GreaterThanOrEqual(bound) => v >= bound,
            Comparator::LessThan(bound) => v < bound,
            Comparator::LessThanOrEqual(bound) => v <= bound,
        }
    }
}

/// Upper bound of a caret range: the next value of the left-most non-zero
/// component, or the immediate patch successor for `^0.0.Z`.
fn caret_upper(base: &Version) -> Version {
    if base.major > 0 {
        base.next_major()
    } else if base.minor > 0 {
        base.next_minor()
    } else {
        base.next_patch()
    }
}

/// A parsed, immutable range expression: alternatives of conjunctions.
#[derive(Debug, Clone)]
pub struct Range {
    clauses: Vec<Vec<Comparator>>,
    source: String,
}

impl Range {
    /// Parse a range expression.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RangeError::range(input, "empty range"));
        }

        let mut clauses = Vec::new();
        for branch in trimmed.split("||") {
            let branch = branch.trim();
            if branch.is_empty() {
                return Err(RangeError::range(input, "empty alternative around \"||\""));
            }
            clauses.push(parse_conjunction(branch, input)?);
        }

        Ok(Range {
            clauses,
            source: trimmed.to_string(),
        })
    }

    /// Test whether a version satisfies this range.
    pub fn satisfies(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .any(|atoms| atoms.iter().all(|a| a.matches(version)))
    }

    /// The raw expression this range was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The newest version in `candidates` satisfying this range, if any.
    pub fn best_match(&self, candidates: &[Version]) -> Option<Version> {
        candidates
            .iter()
            .filter(|v| self.satisfies(v))
            .max()
            .copied()
    }

    #[cfg(test)]
    pub(crate) fn clauses(&self) -> &[Vec<Comparator>] {
        &self.clauses
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The newest version in `candidates` that satisfies `range`, or `None`.
pub fn best_match(range: &Range, candidates: &[Version]) -> Option<Version> {
    range.best_match(candidates)
}

/// Split one `||` branch into atoms and parse each.
///
/// Separators are whitespace and `&&`. Whitespace directly after an
/// operator token is not a separator; an operator token starting
/// mid-string always is.
fn parse_conjunction(branch: &str, full: &str) -> Result<Vec<Comparator>, RangeError> {
    let mut atoms = Vec::new();
    let bytes = branch.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if branch[i..].starts_with("&&") {
            i += 2;
            continue;
        }

        let operator = match_operator(&branch[i..]);
        if let Some(op) = operator {
            i += op.len();
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
        }

        let token_len = version_token_len(&branch[i..]);
        if token_len == 0 {
            return Err(RangeError::range(
                full,
                format!("expected version at \"{}\"", &branch[i..]),
            ));
        }
        let token = &branch[i..i + token_len];
        i += token_len;

        atoms.push(parse_atom(operator, token, full)?);
    }

    if atoms.is_empty() {
        return Err(RangeError::range(full, "empty conjunction"));
    }
    Ok(atoms)
}

fn match_operator(s: &str) -> Option<&'static str> {
    for op in [">=", "<=", ">", "<", "^", "~"] {
        if s.starts_with(op) {
            return Some(op);
        }
    }
    None
}

/// Length of the version token at the start of `s`. A token runs until
/// whitespace, a separator, or the start of a new operator token.
fn version_token_len(s: &str) -> usize {
    s.bytes()
        .position(|b| {
            b.is_ascii_whitespace() || matches!(b, b'&' | b'|' | b'<' | b'>' | b'^' | b'~' | b'=')
        })
        .unwrap_or(s.len())
}

fn parse_atom(operator: Option<&str>, token: &str, full: &str) -> Result<Comparator, RangeError> {
    if operator.is_none() && WILDCARD_RE.is_match(token) {
        return Ok(Comparator::Any);
    }

    let (parts, precision) = parse_version_pattern(token, full)?;

    match operator {
        None => Ok(Comparator::Exact(parts)),
        Some(op) => {
            // Wildcards on the right side of an operator are treated as 0.
            let version = Version::new(
                parts[0].unwrap_or(0),
                parts[1].unwrap_or(0),
                parts[2].unwrap_or(0),
            );
            match op {
                "^" => Ok(Comparator::Caret(version)),
                "~" => Ok(Comparator::Tilde {
                    base: version,
                    precision,
                }),
                ">" => Ok(Comparator::GreaterThan(version)),
                ">=" => Ok(Comparator::GreaterThanOrEqual(version)),
                "<" => Ok(Comparator::LessThan(version)),
                "<=" => Ok(Comparator::LessThanOrEqual(version)),
                _ => Err(RangeError::range(full, format!("unknown operator \"{}\"", op))),
            }
        }
    }
}

/// Parse a version token into pattern parts, reporting how many leading
/// components were written as numbers (the tilde precision).
fn parse_version_pattern(token: &str, full: &str) -> Result<([PatternPart; 3], u8), RangeError> {
    // Pre-release and build metadata are trimmed before comparison.
    let cut = token
        .find(['-', '+'])
        .map(|pos| &token[..pos])
        .unwrap_or(token);

    let caps = ATOM_VERSION_RE
        .captures(cut)
        .ok_or_else(|| RangeError::range(full, format!("invalid version \"{}\"", token)))?;

    let mut parts: [PatternPart; 3] = [None, None, None];
    let mut precision = 0u8;
    let mut numeric_prefix = true;

    for (idx, part) in parts.iter_mut().enumerate() {
        let Some(m) = caps.get(idx + 1) else { break };
        let text = m.as_str();
        if WILDCARD_RE.is_match(text) {
            numeric_prefix = false;
            continue;
        }
        let n: u64 = text
            .parse()
            .map_err(|_| RangeError::range(full, format!("invalid version \"{}\"", token)))?;
        *part = Some(n);
        if numeric_prefix {
            precision += 1;
        }
    }

    Ok((parts, precision))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sat(range: &str, version: &str) -> bool {
        crate::satisfies(range, version)
    }

    #[test]
    fn test_caret() {
        assert!(sat("^1.2.3", "1.2.3"));
        assert!(sat("^1.2.3", "1.9.0"));
        assert!(!sat("^1.2.3", "2.0.0"));
        assert!(!sat("^1.2.3", "1.2.2"));
        assert!(sat("^0.2.3", "0.2.9"));
        assert!(!sat("^0.2.3", "0.3.0"));
        assert!(sat("^0.0.3", "0.0.3"));
        assert!(!sat("^0.0.3", "0.0.4"));
    }

    #[test]
    fn test_tilde() {
        assert!(sat("~1.2.3", "1.2.3"));
        assert!(sat("~1.2.3", "1.2.99"));
        assert!(!sat("~1.2.3", "1.3.0"));
        assert!(!sat("~1.2.3", "1.2.2"));
        // ~X.Y is ~X.Y.0
        assert!(sat("~2.4", "2.4.5"));
        assert!(!sat("~2.4", "2.5.0"));
        // ~X allows any minor within major X
        assert!(sat("~1", "1.9.7"));
        assert!(!sat("~1", "2.0.0"));
        // wildcard stops the precision
        assert!(sat("~1.x", "1.9.7"));
        assert!(!sat("~1.x", "2.0.0"));
    }

    #[test]
    fn test_comparators() {
        assert!(sat(">=1.0.0 <2.0.0", "1.5.0"));
        assert!(!sat(">=1.0.0 <2.0.0", "2.0.0"));
        assert!(!sat(">=1.0.0 <2.0.0", "0.9.9"));
        assert!(sat(">1.2", "1.2.1"));
        assert!(!sat(">1.2", "1.2.0"));
        assert!(sat("<=2.0.0", "2.0.0"));
        assert!(!sat("<2.0.0", "2.0.0"));
    }

    #[test]
    fn test_comparator_wildcards_are_zero() {
        assert!(sat(">=16.x", "16.0.0"));
        assert!(sat(">=16.x", "100.0.0"));
        assert!(!sat(">=16.x", "15.9.9"));
    }

    #[test]
    fn test_or() {
        assert!(sat("1.x || 2.x", "2.5.0"));
        assert!(sat("1.x || 2.x", "1.0.0"));
        assert!(!sat("1.x || 2.x", "3.0.0"));
        assert!(sat(">=2.0.0 || <0.5.0", "0.1.0"));
        assert!(!sat(">=2.0.0 || <0.5.0", "1.0.0"));
    }

    #[test]
    fn test_wildcards() {
        assert!(sat("*", "0.0.1"));
        assert!(sat("*", "99.99.99"));
        assert!(sat("x", "1.2.3"));
        assert!(sat("X", "1.2.3"));
        assert!(sat("1.x", "1.9.0"));
        assert!(!sat("1.x", "2.0.0"));
        assert!(sat("1.2.x", "1.2.7"));
        assert!(!sat("1.2.x", "1.3.0"));
        assert!(sat("2.*.*", "2.1.3"));
    }

    #[test]
    fn test_exact_written_components() {
        assert!(sat("1.2.3", "1.2.3"));
        assert!(!sat("1.2.3", "1.2.4"));
        // missing components are wildcards
        assert!(sat("1.2", "1.2.9"));
        assert!(!sat("1.2", "1.3.0"));
        assert!(sat("1", "1.99.0"));
        assert!(!sat("1", "2.0.0"));
    }

    #[test]
    fn test_and_variants() {
        // explicit &&
        assert!(sat(">=1.0.0 && <2.0.0", "1.5.0"));
        // operator followed by spaces is one atom, not two
        assert!(sat(">= 1.0.0", "1.0.0"));
        assert!(sat(">=  1.0.0 <  2.0.0", "1.5.0"));
        // a new operator token opens a new atom even without whitespace
        assert!(sat(">=1.0.0<2.0.0", "1.5.0"));
        assert!(!sat(">=1.0.0<2.0.0", "2.1.0"));
        let range = Range::parse(">=1.2.3<2.0.0").unwrap();
        assert_eq!(range.clauses()[0].len(), 2);
    }

    #[test]
    fn test_prerelease_trimmed_in_atoms() {
        assert!(sat("^1.2.3-beta", "1.2.3"));
        assert!(sat("^1.2.3+build", "1.3.0"));
        assert!(!sat("^1.2.3+build", "2.0.0"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Range::parse("").is_err());
        assert!(Range::parse("  ").is_err());
        assert!(Range::parse("|| 1.2.3").is_err());
        assert!(Range::parse("1.2.3 ||").is_err());
        assert!(Range::parse(">=").is_err());
        assert!(Range::parse("not-a-version").is_err());
        // totality: satisfies never panics on malformed input
        assert!(!sat("not-a-version", "1.0.0"));
        assert!(!sat("^1.0.0", "not-a-version"));
    }

    #[test]
    fn test_best_match() {
        let range = Range::parse("^4.17.0").unwrap();
        let candidates = [
            Version::parse("4.17.21").unwrap(),
            Version::parse("4.17.20").unwrap(),
            Version::parse("4.17.19").unwrap(),
        ];
        assert_eq!(
            range.best_match(&candidates),
            Some(Version::parse("4.17.21").unwrap())
        );

        let range = Range::parse("^5.0.0").unwrap();
        assert_eq!(range.best_match(&candidates), None);
    }

    #[test]
    fn test_best_match_singleton_law() {
        // best_match(r, [v]) = v iff satisfies(r, v)
        for (r, v) in [("^1.2.0", "1.3.0"), ("~1.2.0", "1.3.0"), ("*", "0.0.1")] {
            let range = Range::parse(r).unwrap();
            let version = Version::parse(v).unwrap();
            let matched = range.best_match(&[version]);
            assert_eq!(matched.is_some(), range.satisfies(&version), "{} vs {}", r, v);
        }
    }
}
