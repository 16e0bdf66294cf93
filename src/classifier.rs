//! Labels a difference region with its likely cause.
//!
//! Selection is an ordered list of guards over grayscale statistics of the two
//! crops; everything shown to the user for a given label comes from one static
//! table keyed by [`IssueType`].

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::regions::BoundingBox;
use crate::report::Severity;

/// Mean brightness gap that marks content present on one side only.
pub const BRIGHTNESS_DELTA: f64 = 30.0;
/// Area above which a missing/extra region counts as a whole component.
pub const COMPONENT_AREA: u32 = 1000;
/// Area below which a thin region is a spacing problem.
pub const SPACING_AREA: u32 = 500;
/// Either side below this makes a region "thin".
pub const SPACING_EXTENT: u32 = 50;
/// Area above which a texture change reads as a layout problem.
pub const LAYOUT_AREA: u32 = 2000;
/// Standard-deviation gap required for a layout problem.
pub const LAYOUT_STD_DELTA: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    #[serde(rename = "Missing UI Component")]
    MissingComponent,
    #[serde(rename = "Missing Small Element")]
    MissingSmallElement,
    #[serde(rename = "Extra UI Component")]
    ExtraComponent,
    #[serde(rename = "Extra Small Element")]
    ExtraSmallElement,
    #[serde(rename = "Spacing/Alignment Issue")]
    SpacingAlignment,
    #[serde(rename = "Layout/Positioning Issue")]
    LayoutPositioning,
    #[serde(rename = "Visual Inconsistency")]
    VisualInconsistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    #[serde(rename = "Content Issues")]
    Content,
    #[serde(rename = "Metadata Issues")]
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    pub issue_type: IssueType,
    pub issue_category: IssueCategory,
    pub explanation: String,
    pub severity: Severity,
    pub code_snippet: String,
    pub fix_steps: Vec<String>,
}

/// Grayscale statistics of the two crops of one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub reference_mean: f64,
    pub reference_std: f64,
    pub built_mean: f64,
    pub built_std: f64,
}

impl RegionStats {
    /// `None` when either crop has no pixels; mean and deviation are
    /// undefined there.
    pub fn measure(reference: &GrayImage, built: &GrayImage) -> Option<Self> {
        let (reference_mean, reference_std) = mean_std(reference)?;
        let (built_mean, built_std) = mean_std(built)?;
        Some(Self {
            reference_mean,
            reference_std,
            built_mean,
            built_std,
        })
    }
}

/// Population mean and standard deviation.
pub fn mean_std(image: &GrayImage) -> Option<(f64, f64)> {
    let raw = image.as_raw();
    if raw.is_empty() {
        return None;
    }
    let n = raw.len() as f64;
    let mean = raw.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = raw
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some((mean, var.sqrt()))
}

/// First matching guard wins.
pub fn classify(stats: &RegionStats, area: u32, bounds: &BoundingBox) -> IssueType {
    if stats.reference_mean > stats.built_mean + BRIGHTNESS_DELTA {
        if area > COMPONENT_AREA {
            IssueType::MissingComponent
        } else {
            IssueType::MissingSmallElement
        }
    } else if stats.built_mean > stats.reference_mean + BRIGHTNESS_DELTA {
        if area > COMPONENT_AREA {
            IssueType::ExtraComponent
        } else {
            IssueType::ExtraSmallElement
        }
    } else if area < SPACING_AREA
        && (bounds.width < SPACING_EXTENT || bounds.height < SPACING_EXTENT)
    {
        IssueType::SpacingAlignment
    } else if area > LAYOUT_AREA
        && (stats.reference_std - stats.built_std).abs() > LAYOUT_STD_DELTA
    {
        IssueType::LayoutPositioning
    } else {
        IssueType::VisualInconsistency
    }
}

pub fn analyze(stats: &RegionStats, area: u32, bounds: &BoundingBox) -> IssueAnalysis {
    classify(stats, area, bounds).analysis(area, bounds)
}

struct IssueTemplate {
    category: IssueCategory,
    severity: Severity,
    explanation: &'static str,
    snippet: &'static str,
    fix_steps: &'static [&'static str],
}

impl IssueType {
    /// Render the templates for a concrete region.
    pub fn analysis(self, area: u32, bounds: &BoundingBox) -> IssueAnalysis {
        let t = self.template();
        IssueAnalysis {
            issue_type: self,
            issue_category: t.category,
            explanation: interpolate(t.explanation, area, bounds),
            severity: t.severity,
            code_snippet: interpolate(t.snippet, area, bounds),
            fix_steps: t.fix_steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn template(self) -> &'static IssueTemplate {
        match self {
            IssueType::MissingComponent => &MISSING_COMPONENT,
            IssueType::MissingSmallElement => &MISSING_SMALL_ELEMENT,
            IssueType::ExtraComponent => &EXTRA_COMPONENT,
            IssueType::ExtraSmallElement => &EXTRA_SMALL_ELEMENT,
            IssueType::SpacingAlignment => &SPACING_ALIGNMENT,
            IssueType::LayoutPositioning => &LAYOUT_POSITIONING,
            IssueType::VisualInconsistency => &VISUAL_INCONSISTENCY,
        }
    }
}

/// Substitute `{area}`, `{x}`, `{y}`, `{w}` and `{h}`. Other braces are
/// literal CSS.
fn interpolate(template: &str, area: u32, bounds: &BoundingBox) -> String {
    template
        .replace("{area}", &area.to_string())
        .replace("{x}", &bounds.x.to_string())
        .replace("{y}", &bounds.y.to_string())
        .replace("{w}", &bounds.width.to_string())
        .replace("{h}", &bounds.height.to_string())
}

static MISSING_COMPONENT: IssueTemplate = IssueTemplate {
    category: IssueCategory::Content,
    severity: Severity::High,
    explanation: "A large UI component (area: {area}px²) is present in the design but missing in the implementation. This could be a button, card, section, or other major UI element.",
    snippet: r#"<!-- Add the missing component at position ({x}, {y}) -->
<div class="missing-component" style="width: {w}px; height: {h}px;">
    <!-- Replace with actual component content -->
    <button class="btn btn-primary">Missing Button</button>
</div>

/* CSS for the missing component */
.missing-component {
    position: absolute;
    left: {x}px;
    top: {y}px;
    width: {w}px;
    height: {h}px;
}"#,
    fix_steps: &[
        "Identify the missing component from the design",
        "Add the component to the HTML structure",
        "Apply appropriate styling to match the design",
        "Ensure proper positioning and dimensions",
    ],
};

static MISSING_SMALL_ELEMENT: IssueTemplate = IssueTemplate {
    category: IssueCategory::Content,
    severity: Severity::Medium,
    explanation: "A small UI element (area: {area}px²) is missing from the implementation. This could be an icon, text, or decorative element.",
    snippet: r#"<!-- Add the missing small element -->
<span class="missing-element" style="width: {w}px; height: {h}px;">
    <!-- Replace with actual element (icon, text, etc.) -->
    <i class="icon-missing"></i>
</span>

/* CSS for the missing element */
.missing-element {
    position: absolute;
    left: {x}px;
    top: {y}px;
    width: {w}px;
    height: {h}px;
    display: flex;
    align-items: center;
    justify-content: center;
}"#,
    fix_steps: &[
        "Identify the missing element from the design",
        "Add the element to the appropriate container",
        "Apply correct positioning and styling",
        "Ensure the element is visible and accessible",
    ],
};

static EXTRA_COMPONENT: IssueTemplate = IssueTemplate {
    category: IssueCategory::Content,
    severity: Severity::High,
    explanation: "An extra UI component (area: {area}px²) is present in the implementation but not in the design. This should be removed or hidden.",
    snippet: r#"<!-- Remove or hide the extra component -->
<!-- Find and remove this component from your HTML -->
<div class="extra-component" style="display: none;">
    <!-- This component should not be here -->
</div>

/* CSS to hide the extra component */
.extra-component {
    display: none !important;
    /* Or use: visibility: hidden; */
}"#,
    fix_steps: &[
        "Identify the extra component in the implementation",
        "Remove it from the HTML structure if not needed",
        "Or hide it with CSS if it might be needed later",
        "Update any related JavaScript functionality",
    ],
};

static EXTRA_SMALL_ELEMENT: IssueTemplate = IssueTemplate {
    category: IssueCategory::Content,
    severity: Severity::Medium,
    explanation: "An extra small element (area: {area}px²) is present in the implementation but not in the design.",
    snippet: r#"<!-- Remove or hide the extra element -->
<!-- Find and remove this element -->
<span class="extra-element" style="display: none;">
    <!-- This element should not be here -->
</span>

/* CSS to hide the extra element */
.extra-element {
    display: none !important;
}"#,
    fix_steps: &[
        "Identify the extra element in the implementation",
        "Remove it from the HTML if not needed",
        "Or hide it with CSS",
        "Check if it affects layout or functionality",
    ],
};

static SPACING_ALIGNMENT: IssueTemplate = IssueTemplate {
    category: IssueCategory::Metadata,
    severity: Severity::Low,
    explanation: "A spacing or alignment issue detected (area: {area}px²). This is likely a minor positioning or spacing problem.",
    snippet: r#"/* Fix spacing/alignment issue */
.element {
    margin: 0;
    padding: 0;
    /* Adjust spacing as needed */
    margin-left: {x}px;
    margin-top: {y}px;
}

/* Or use flexbox for better alignment */
.container {
    display: flex;
    align-items: center;
    justify-content: space-between;
    gap: 10px;
}"#,
    fix_steps: &[
        "Check spacing between elements",
        "Adjust margins and padding",
        "Use flexbox or grid for alignment",
        "Ensure consistent spacing throughout",
    ],
};

static LAYOUT_POSITIONING: IssueTemplate = IssueTemplate {
    category: IssueCategory::Metadata,
    severity: Severity::Medium,
    explanation: "A layout or positioning issue detected (area: {area}px²). The element exists but is positioned or sized incorrectly.",
    snippet: r#"/* Fix the positioning/sizing issue */
.component {
    position: absolute;
    left: {x}px;
    top: {y}px;
    width: {w}px;
    height: {h}px;
    /* Ensure proper positioning */
    z-index: 1;
}

/* Alternative: Use flexbox/grid for better layout */
.container {
    display: flex;
    align-items: center;
    justify-content: center;
}"#,
    fix_steps: &[
        "Check the element's positioning in the design",
        "Update CSS positioning properties",
        "Verify dimensions match the design",
        "Test on different screen sizes",
    ],
};

static VISUAL_INCONSISTENCY: IssueTemplate = IssueTemplate {
    category: IssueCategory::Metadata,
    severity: Severity::Medium,
    explanation: "A visual inconsistency detected (area: {area}px²). The element may have different styling, colors, or visual properties.",
    snippet: r#"/* Fix visual inconsistency */
.element {
    /* Check and update these properties */
    background-color: #correct-color;
    border-radius: 4px;
    box-shadow: 0 2px 4px rgba(0,0,0,0.1);
    font-size: 14px;
    line-height: 1.5;
}"#,
    fix_steps: &[
        "Compare visual properties with design",
        "Update colors, fonts, and styling",
        "Check for missing CSS properties",
        "Ensure consistent visual appearance",
    ],
};
