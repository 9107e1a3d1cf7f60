//! Vulnerability data: CVE model, severity thresholds, and the
//! rate-limited adapter in front of the vulnerability database.

mod adapter;
mod cve;
mod threshold;

pub use adapter::AdvisoryAdapter;
pub use cve::{CveItem, Severity, SeverityCounts, VulnerabilityList};
pub use threshold::VulnerabilityThreshold;
