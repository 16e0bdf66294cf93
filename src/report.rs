use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::IssueAnalysis;
use crate::regions::BoundingBox;

/// Area above which a finding is `High`.
pub const HIGH_SEVERITY_AREA: u32 = 1000;
/// Area above which a finding is at least `Medium`.
pub const MEDIUM_SEVERITY_AREA: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Finding-level grade. Independent of the classifier's own severity;
    /// the two may disagree for the same region.
    pub fn from_area(area: u32) -> Self {
        if area > HIGH_SEVERITY_AREA {
            Severity::High
        } else if area > MEDIUM_SEVERITY_AREA {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Which side a region's content belongs to, decided by which crop is
/// brighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifferenceKind {
    #[serde(rename = "Missing Element")]
    Missing,
    #[serde(rename = "Extra Element")]
    Extra,
}

impl DifferenceKind {
    /// `Missing` only when the reference crop is strictly brighter.
    pub fn from_means(reference_mean: f64, built_mean: f64) -> Self {
        if reference_mean > built_mean {
            DifferenceKind::Missing
        } else {
            DifferenceKind::Extra
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DifferenceKind::Missing => "Element present in design but missing in implementation",
            DifferenceKind::Extra => "Element present in implementation but not in design",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: DifferenceKind,
    pub description: String,
    pub location: String,
    pub size: String,
    pub area: u32,
    pub severity: Severity,
    pub coordinates: BoundingBox,
    pub issue_analysis: IssueAnalysis,
}

impl Finding {
    pub fn new(
        id: usize,
        kind: DifferenceKind,
        bounds: BoundingBox,
        area: u32,
        issue_analysis: IssueAnalysis,
    ) -> Self {
        Self {
            id,
            kind,
            description: kind.description().to_string(),
            location: format!("({}, {})", bounds.x, bounds.y),
            size: format!("{} × {}", bounds.width, bounds.height),
            area,
            severity: Severity::from_area(area),
            coordinates: bounds,
            issue_analysis,
        }
    }
}

/// Everything one comparison run reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub similarity: String,
    pub message: String,
    pub comparison_image: PathBuf,
    pub figma_image: PathBuf,
    pub built_image: PathBuf,
    pub difference_image: PathBuf,
    pub detected_differences: Vec<Finding>,
    pub total_differences: usize,
}

impl ComparisonResult {
    pub fn new(score: f64, images: OutputImages, detected_differences: Vec<Finding>) -> Self {
        let similarity = format_percent(score);
        let message = format!("The images are {similarity}% similar based on structural similarity.");
        Self {
            similarity,
            message,
            comparison_image: images.comparison,
            figma_image: images.reference,
            built_image: images.built,
            difference_image: images.difference,
            total_differences: detected_differences.len(),
            detected_differences,
        }
    }

    pub fn image_paths_mut(&mut self) -> [&mut PathBuf; 4] {
        [
            &mut self.comparison_image,
            &mut self.figma_image,
            &mut self.built_image,
            &mut self.difference_image,
        ]
    }
}

/// Where the four rendered images were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputImages {
    pub comparison: PathBuf,
    pub reference: PathBuf,
    pub built: PathBuf,
    pub difference: PathBuf,
}

/// Mean similarity in [0, 1] as a two-decimal percentage string.
pub fn format_percent(score: f64) -> String {
    format!("{:.2}", score * 100.0)
}
