//! Vulnerability thresholds

use super::cve::VulnerabilityList;

/// Per-severity upper bounds on vulnerability counts. A list passes the
/// threshold iff every bucket stays within its bound; `NONE` and
/// `UNKNOWN` findings are never counted against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulnerabilityThreshold {
    pub max_critical: u32,
    pub max_high: u32,
    pub max_medium: u32,
    pub max_low: u32,
}

impl VulnerabilityThreshold {
    /// No critical findings allowed.
    pub const CRITICAL: VulnerabilityThreshold = VulnerabilityThreshold {
        max_critical: 0,
        max_high: u32::MAX,
        max_medium: u32::MAX,
        max_low: u32::MAX,
    };

    /// No critical or high findings allowed.
    pub const HIGH: VulnerabilityThreshold = VulnerabilityThreshold {
        max_critical: 0,
        max_high: 0,
        max_medium: u32::MAX,
        max_low: u32::MAX,
    };

    /// No critical, high, or medium findings allowed.
    pub const MEDIUM: VulnerabilityThreshold = VulnerabilityThreshold {
        max_critical: 0,
        max_high: 0,
        max_medium: 0,
        max_low: u32::MAX,
    };

    /// No findings of any counted severity allowed.
    pub const LOW: VulnerabilityThreshold = VulnerabilityThreshold {
        max_critical: 0,
        max_high: 0,
        max_medium: 0,
        max_low: 0,
    };

    /// Parse the external threshold encoding: a preset name or
    /// `CUSTOM:<c>,<h>,<m>,<l>`. Any other value disables threshold
    /// filtering and yields `None`; a malformed `CUSTOM:` spec does too
    /// (all four components must be valid, or none apply).
    pub fn parse(input: &str) -> Option<VulnerabilityThreshold> {
        let trimmed = input.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "CRITICAL" => return Some(Self::CRITICAL),
            "HIGH" => return Some(Self::HIGH),
            "MEDIUM" => return Some(Self::MEDIUM),
            "LOW" => return Some(Self::LOW),
            _ => {}
        }

        let spec = trimmed
            .strip_prefix("CUSTOM:")
            .or_else(|| trimmed.strip_prefix("custom:"))?;
        let parts: Vec<&str> = spec.split(',').collect();
        if parts.len() != 4 {
            return None;
        }

        let mut caps = [0u32; 4];
        for (slot, part) in caps.iter_mut().zip(&parts) {
            *slot = part.trim().parse().ok()?;
        }

        Some(VulnerabilityThreshold {
            max_critical: caps[0],
            max_high: caps[1],
            max_medium: caps[2],
            max_low: caps[3],
        })
    }

    /// Check a vulnerability list against the bounds.
    pub fn passes(&self, list: &VulnerabilityList) -> bool {
        let counts = list.counts();
        counts.critical <= self.max_critical
            && counts.high <= self.max_high
            && counts.medium <= self.max_medium
            && counts.low <= self.max_low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::cve::{CveItem, Severity};

    fn list(severities: &[Severity]) -> VulnerabilityList {
        VulnerabilityList::new(
            severities
                .iter()
                .enumerate()
                .map(|(i, severity)| CveItem {
                    id: format!("CVE-TEST-{}", i),
                    description: String::new(),
                    severity: *severity,
                    cvss: None,
                    published: None,
                    modified: None,
                    references: Vec::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_presets() {
        assert_eq!(VulnerabilityThreshold::parse("CRITICAL"), Some(VulnerabilityThreshold::CRITICAL));
        assert_eq!(VulnerabilityThreshold::parse("high"), Some(VulnerabilityThreshold::HIGH));
        assert_eq!(VulnerabilityThreshold::parse("Medium"), Some(VulnerabilityThreshold::MEDIUM));
        assert_eq!(VulnerabilityThreshold::parse("LOW"), Some(VulnerabilityThreshold::LOW));
    }

    #[test]
    fn test_custom() {
        let threshold = VulnerabilityThreshold::parse("CUSTOM:1,2,3,4").unwrap();
        assert_eq!(threshold.max_critical, 1);
        assert_eq!(threshold.max_high, 2);
        assert_eq!(threshold.max_medium, 3);
        assert_eq!(threshold.max_low, 4);
    }

    #[test]
    fn test_custom_validates_atomically() {
        assert_eq!(VulnerabilityThreshold::parse("CUSTOM:1,2,3"), None);
        assert_eq!(VulnerabilityThreshold::parse("CUSTOM:1,2,3,x"), None);
        assert_eq!(VulnerabilityThreshold::parse("CUSTOM:1,2,3,-1"), None);
        assert_eq!(VulnerabilityThreshold::parse("CUSTOM:"), None);
    }

    #[test]
    fn test_unrecognized_disables() {
        assert_eq!(VulnerabilityThreshold::parse(""), None);
        assert_eq!(VulnerabilityThreshold::parse("none"), None);
        assert_eq!(VulnerabilityThreshold::parse("SEVERE"), None);
    }

    #[test]
    fn test_passes() {
        let high = VulnerabilityThreshold::HIGH;
        assert!(high.passes(&list(&[])));
        assert!(high.passes(&list(&[Severity::Medium, Severity::Low])));
        assert!(!high.passes(&list(&[Severity::High])));
        assert!(!high.passes(&list(&[Severity::Critical])));

        let critical = VulnerabilityThreshold::CRITICAL;
        assert!(critical.passes(&list(&[Severity::High, Severity::High])));
        assert!(!critical.passes(&list(&[Severity::Critical])));

        // Uncounted buckets never fail a threshold
        assert!(VulnerabilityThreshold::LOW.passes(&list(&[Severity::None, Severity::Unknown])));
    }

    #[test]
    fn test_custom_bounds_are_inclusive() {
        let threshold = VulnerabilityThreshold::parse("CUSTOM:0,1,0,0").unwrap();
        assert!(threshold.passes(&list(&[Severity::High])));
        assert!(!threshold.passes(&list(&[Severity::High, Severity::High])));
    }
}
