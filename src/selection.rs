use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::report::Finding;

/// What a reviewer decided for one finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Neglect,
    /// Any other value keeps the finding.
    #[serde(other)]
    Keep,
}

/// Selections keyed by finding id as a string, e.g. `{"2": "neglect"}`.
pub type IssueSelections = HashMap<String, Selection>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredIssues {
    pub filtered_differences: Vec<Finding>,
    pub total_original: usize,
    pub total_filtered: usize,
    pub neglected_count: usize,
}

/// Drop every finding marked `neglect`, keeping the original order.
pub fn filter_findings(findings: &[Finding], selections: &IssueSelections) -> FilteredIssues {
    let filtered_differences: Vec<Finding> = findings
        .iter()
        .filter(|f| selections.get(&f.id.to_string()) != Some(&Selection::Neglect))
        .cloned()
        .collect();

    let total_original = findings.len();
    let total_filtered = filtered_differences.len();

    FilteredIssues {
        filtered_differences,
        total_original,
        total_filtered,
        neglected_count: total_original - total_filtered,
    }
}
