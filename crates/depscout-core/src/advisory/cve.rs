//! CVE records and severity classification

use serde::{Deserialize, Serialize};

/// Severity bucket of a vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    None,
    Unknown,
}

impl Severity {
    /// Parse an upstream severity label.
    pub fn from_label(label: &str) -> Severity {
        match label.to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" | "MODERATE" => Severity::Medium,
            "LOW" => Severity::Low,
            "NONE" => Severity::None,
            _ => Severity::Unknown,
        }
    }

    /// Derive a severity from a CVSS base score when the record carries no
    /// explicit label.
    pub fn from_cvss(score: f64) -> Severity {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else if score >= 0.1 {
            Severity::Low
        } else {
            Severity::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::None => "NONE",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized vulnerability record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveItem {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// Per-severity tallies of a vulnerability list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub none: u32,
    pub unknown: u32,
}

/// An ordered list of vulnerabilities for one package version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnerabilityList {
    pub items: Vec<CveItem>,
}

impl VulnerabilityList {
    pub fn new(items: Vec<CveItem>) -> Self {
        VulnerabilityList { items }
    }

    pub fn empty() -> Self {
        VulnerabilityList::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for item in &self.items {
            match item.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::None => counts.none += 1,
                Severity::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

// NVD 2.0 response shape. Only the fields we normalize are declared.

#[derive(Debug, Deserialize)]
struct NvdResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdEntry>,
}

#[derive(Debug, Deserialize)]
struct NvdEntry {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
struct NvdCve {
    id: String,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    metrics: NvdMetrics,
    #[serde(default)]
    published: Option<String>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<String>,
    #[serde(default)]
    references: Vec<NvdReference>,
}

#[derive(Debug, Deserialize)]
struct NvdDescription {
    lang: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct NvdMetrics {
    #[serde(default, rename = "cvssMetricV31")]
    cvss_v31: Vec<NvdCvssMetric>,
    #[serde(default, rename = "cvssMetricV30")]
    cvss_v30: Vec<NvdCvssMetric>,
    #[serde(default, rename = "cvssMetricV2")]
    cvss_v2: Vec<NvdCvssMetric>,
}

#[derive(Debug, Deserialize)]
struct NvdCvssMetric {
    #[serde(rename = "cvssData")]
    cvss_data: NvdCvssData,
}

#[derive(Debug, Deserialize)]
struct NvdCvssData {
    #[serde(rename = "baseScore")]
    base_score: f64,
    #[serde(default, rename = "baseSeverity")]
    base_severity: Option<String>,
}

/// Parse an NVD 2.0 payload into a normalized list, preserving upstream
/// order.
pub(crate) fn parse_nvd(payload: &[u8]) -> Result<VulnerabilityList, serde_json::Error> {
    let response: NvdResponse = serde_json::from_slice(payload)?;

    let items = response
        .vulnerabilities
        .into_iter()
        .map(|entry| {
            let cve = entry.cve;

            let metric = cve
                .metrics
                .cvss_v31
                .first()
                .or_else(|| cve.metrics.cvss_v30.first())
                .or_else(|| cve.metrics.cvss_v2.first());

            let cvss = metric.map(|m| m.cvss_data.base_score);
            let severity = match metric {
                Some(m) => match &m.cvss_data.base_severity {
                    Some(label) => Severity::from_label(label),
                    None => Severity::from_cvss(m.cvss_data.base_score),
                },
                None => Severity::Unknown,
            };

            let description = cve
                .descriptions
                .iter()
                .find(|d| d.lang == "en")
                .or_else(|| cve.descriptions.first())
                .map(|d| d.value.clone())
                .unwrap_or_default();

            CveItem {
                id: cve.id,
                description,
                severity,
                cvss,
                published: cve.published,
                modified: cve.last_modified,
                references: cve.references.into_iter().map(|r| r.url).collect(),
            }
        })
        .collect();

    Ok(VulnerabilityList::new(items))
}

#[derive(Debug, Deserialize)]
struct NvdReference {
    url: String,
}
