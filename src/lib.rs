//! Design-versus-implementation screenshot comparison.
//!
//! [`compare::compare_images`] scores a reference design against a built
//! screenshot with SSIM, extracts the dissimilar regions, classifies each one
//! and writes four annotated JPEGs next to the returned report.

pub mod bulk;
pub mod classifier;
pub mod compare;
pub mod config;
pub mod error;
pub mod regions;
pub mod render;
pub mod report;
pub mod selection;
pub mod ssim;

pub use compare::{analyze_pair, compare_images};
pub use config::EngineConfig;
pub use error::CompareError;
pub use report::{ComparisonResult, Finding};
