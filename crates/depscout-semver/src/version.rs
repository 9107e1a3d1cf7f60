//! Version parsing and ordering

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::range::RangeError;

lazy_static! {
    // Concrete version: optional leading v, one to three numeric components.
    // Pre-release and build metadata are stripped before this regex runs.
    static ref VERSION_RE: Regex = Regex::new(r"^[vV]?(\d+)(?:\.(\d+))?(?:\.(\d+))?$").unwrap();
}

/// A concrete semantic version as a `(major, minor, patch)` triple.
///
/// Pre-release and build-metadata segments are stripped during parsing;
/// ordering is lexicographic on the triple. Serializes as the dotted
/// string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version { major, minor, patch }
    }

    /// Parse a version string.
    ///
    /// Accepts a leading `v`, a trailing `-<prerelease>` or `+<build>`
    /// segment (both dropped for comparison), and one or two missing
    /// components, which are treated as zero.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RangeError::InvalidVersion(input.to_string()));
        }

        // Strip pre-release and build metadata, whichever comes first.
        let cut = trimmed
            .find(['-', '+'])
            .map(|pos| &trimmed[..pos])
            .unwrap_or(trimmed);

        let caps = VERSION_RE
            .captures(cut)
            .ok_or_else(|| RangeError::InvalidVersion(input.to_string()))?;

        let component = |idx: usize| -> Result<u64, RangeError> {
            match caps.get(idx) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| RangeError::InvalidVersion(input.to_string())),
                None => Ok(0),
            }
        };

        Ok(Version {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
        })
    }

    /// The smallest version strictly above every version sharing this major.
    pub fn next_major(&self) -> Version {
        Version::new(self.major + 1, 0, 0)
    }

    /// The smallest version strictly above every version sharing this
    /// major.minor pair.
    pub fn next_minor(&self) -> Version {
        Version::new(self.major, self.minor + 1, 0)
    }

    /// The immediate successor in patch order.
    pub fn next_patch(&self) -> Version {
        Version::new(self.major, self.minor, self.patch + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        assert_eq!(Version::parse("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("0.0.0").unwrap(), Version::new(0, 0, 0));
        assert_eq!(Version::parse("10.20.30").unwrap(), Version::new(10, 20, 30));
    }

    #[test]
    fn test_parse_leading_v() {
        assert_eq!(Version::parse("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("V4.17.21").unwrap(), Version::new(4, 17, 21));
    }

    #[test]
    fn test_parse_missing_components() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(Version::parse("16").unwrap(), Version::new(16, 0, 0));
    }

    #[test]
    fn test_parse_prerelease_and_build_stripped() {
        assert_eq!(Version::parse("1.2.3-beta.1").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("1.2.3+build.42").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("1.2.3-rc.1+sha.abc").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("v2.0.0-alpha").unwrap(), Version::new(2, 0, 0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("x").is_err());
    }

    #[test]
    fn test_ordering() {
        let mut versions = vec![
            Version::parse("1.10.0").unwrap(),
            Version::parse("1.2.0").unwrap(),
            Version::parse("2.0.0").unwrap(),
            Version::parse("0.9.9").unwrap(),
        ];
        versions.sort();
        assert_eq!(
            versions,
            vec![
                Version::new(0, 9, 9),
                Version::new(1, 2, 0),
                Version::new(1, 10, 0),
                Version::new(2, 0, 0),
            ]
        );
    }

    #[test]
    fn test_successors() {
        let v = Version::new(1, 2, 3);
        assert_eq!(v.next_major(), Version::new(2, 0, 0));
        assert_eq!(v.next_minor(), Version::new(1, 3, 0));
        assert_eq!(v.next_patch(), Version::new(1, 2, 4));
    }

    #[test]
    fn test_display_round_trip() {
        let v = Version::parse("v1.2.3-beta").unwrap();
        assert_eq!(v.to_string(), "1.2.3");
        assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_serde_string_form() {
        let v = Version::new(4, 17, 21);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"4.17.21\"");

        let parsed: Version = serde_json::from_str("\"v1.2.3-beta\"").unwrap();
        assert_eq!(parsed, Version::new(1, 2, 3));
        assert!(serde_json::from_str::<Version>("\"nope\"").is_err());
    }
}
