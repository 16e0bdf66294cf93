use std::path::Path;

use chrono::Local;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::classifier::{self, RegionStats};
use crate::config::EngineConfig;
use crate::error::CompareError;
use crate::regions::{self, Blob};
use crate::render::{self, Annotations};
use crate::report::{ComparisonResult, DifferenceKind, Finding};
use crate::ssim::{self, Similarity};

/// One retained difference with the grayscale crops of both images.
#[derive(Debug, Clone)]
pub struct Region {
    /// 1-based, in contour discovery order.
    pub id: usize,
    pub blob: Blob,
    pub kind: DifferenceKind,
    pub stats: RegionStats,
    pub reference_crop: GrayImage,
    pub built_crop: GrayImage,
}

/// In-memory outcome of comparing one image pair, before anything is written.
#[derive(Debug)]
pub struct PairAnalysis {
    pub similarity: Similarity,
    pub regions: Vec<Region>,
    pub findings: Vec<Finding>,
    pub annotations: Annotations,
}

/// Compare a reference design against a built screenshot, write the four
/// annotated JPEGs into `output_dir` and return the report.
///
/// `output_dir` must already exist; it is never created here.
pub fn compare_images(
    reference_path: &Path,
    built_path: &Path,
    output_dir: &Path,
    config: &EngineConfig,
) -> Result<ComparisonResult, CompareError> {
    let reference = load_image(reference_path)?;
    let built = load_image(built_path)?;

    let analysis = analyze_pair(&reference, &built, config)?;

    let output_dir = std::path::absolute(output_dir).map_err(|source| CompareError::Write {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let stamp = render::timestamp(Local::now());
    let paths = render::output_paths(&output_dir, &stamp);
    render::write_outputs(&analysis.annotations, &paths, config.jpeg_quality)?;

    let result = ComparisonResult::new(analysis.similarity.score, paths, analysis.findings);

    tracing::info!(
        "compared {} against {}: {}% similar, {} difference(s)",
        reference_path.display(),
        built_path.display(),
        result.similarity,
        result.total_differences
    );

    Ok(result)
}

pub fn load_image(path: &Path) -> Result<DynamicImage, CompareError> {
    let img = image::open(path).map_err(|source| CompareError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    if img.width() == 0 || img.height() == 0 {
        return Err(CompareError::EmptyImage {
            path: path.to_path_buf(),
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(img)
}

/// The reference is always resampled to the built image's geometry, even
/// when the two already match.
pub fn normalize(reference: &DynamicImage, built: &DynamicImage) -> (RgbImage, RgbImage) {
    let (width, height) = (built.width(), built.height());
    let reference = reference.resize_exact(width, height, FilterType::Triangle);
    (reference.to_rgb8(), built.to_rgb8())
}

pub fn analyze_pair(
    reference: &DynamicImage,
    built: &DynamicImage,
    config: &EngineConfig,
) -> Result<PairAnalysis, CompareError> {
    for (img, side) in [(reference, "reference"), (built, "built")] {
        if img.width() == 0 || img.height() == 0 {
            return Err(CompareError::EmptyInput {
                side,
                width: img.width(),
                height: img.height(),
            });
        }
    }

    let (reference_rgb, built_rgb) = normalize(reference, built);
    let reference_gray: GrayImage = image::imageops::grayscale(&reference_rgb);
    let built_gray: GrayImage = image::imageops::grayscale(&built_rgb);

    let similarity = ssim::structural_similarity(&reference_gray, &built_gray)?;
    let mask = regions::dissimilarity_mask(&similarity.map);
    let blobs = regions::extract_blobs(&mask, config.min_area);

    let mut annotations = Annotations::new(&reference_rgb, &built_rgb);
    let mut found = Vec::with_capacity(blobs.len());
    let mut findings = Vec::with_capacity(blobs.len());

    for (index, blob) in blobs.into_iter().enumerate() {
        let id = index + 1;
        let b = blob.bounds;

        let reference_crop =
            image::imageops::crop_imm(&reference_gray, b.x, b.y, b.width, b.height).to_image();
        let built_crop = image::imageops::crop_imm(&built_gray, b.x, b.y, b.width, b.height).to_image();

        let stats = RegionStats::measure(&reference_crop, &built_crop)
            .ok_or(CompareError::EmptyRegion { id })?;
        let kind = DifferenceKind::from_means(stats.reference_mean, stats.built_mean);
        let issue = classifier::analyze(&stats, blob.area, &b);

        tracing::debug!(
            "region {id} at ({}, {}) {}x{} area={} kind={kind:?} issue={:?}",
            b.x,
            b.y,
            b.width,
            b.height,
            blob.area,
            issue.issue_type
        );

        annotations.mark(&blob, kind, config.box_thickness);
        findings.push(Finding::new(id, kind, b, blob.area, issue));
        found.push(Region {
            id,
            blob,
            kind,
            stats,
            reference_crop,
            built_crop,
        });
    }

    Ok(PairAnalysis {
        similarity,
        regions: found,
        findings,
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    fn with_rect(mut img: RgbImage, x: u32, y: u32, w: u32, h: u32, v: u8) -> RgbImage {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Rgb([v, v, v]));
            }
        }
        img
    }

    #[test]
    fn reference_is_resampled_to_built_geometry() {
        let reference = DynamicImage::ImageRgb8(solid(50, 40, 90));
        let built = DynamicImage::ImageRgb8(solid(100, 80, 90));
        let (r, b) = normalize(&reference, &built);
        assert_eq!(r.dimensions(), (100, 80));
        assert_eq!(b.dimensions(), (100, 80));
    }

    #[test]
    fn identical_pair_has_no_regions() {
        let img = DynamicImage::ImageRgb8(with_rect(solid(64, 48, 200), 10, 10, 20, 20, 30));
        let analysis = analyze_pair(&img, &img.clone(), &EngineConfig::default()).unwrap();
        assert_eq!(analysis.similarity.score, 1.0);
        assert!(analysis.regions.is_empty());
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn crops_follow_the_bounding_box() {
        let reference = DynamicImage::ImageRgb8(solid(120, 80, 160));
        let built = DynamicImage::ImageRgb8(with_rect(solid(120, 80, 160), 40, 20, 30, 30, 0));
        let analysis = analyze_pair(&reference, &built, &EngineConfig::default()).unwrap();
        assert_eq!(analysis.regions.len(), 1);
        let region = &analysis.regions[0];
        assert_eq!(region.id, 1);
        assert_eq!(region.reference_crop.dimensions(), (region.blob.bounds.width, region.blob.bounds.height));
        assert_eq!(region.built_crop.dimensions(), region.reference_crop.dimensions());
        assert_eq!(region.kind, DifferenceKind::Missing);
        assert!(region.stats.reference_mean > region.stats.built_mean);
    }

    #[test]
    fn zero_extent_input_names_its_side() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let img = DynamicImage::ImageRgb8(solid(20, 20, 100));

        let err = analyze_pair(&empty, &img, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, CompareError::EmptyInput { side: "reference", .. }));

        let err = analyze_pair(&img, &empty, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, CompareError::EmptyInput { side: "built", .. }));
        assert_eq!(err.to_string(), "built image has zero extent (0x0)");
    }

    #[test]
    fn left_edge_block_is_found() {
        let reference = DynamicImage::ImageRgb8(solid(200, 100, 128));
        let built = DynamicImage::ImageRgb8(with_rect(solid(200, 100, 128), 0, 20, 40, 60, 0));
        let analysis = analyze_pair(&reference, &built, &EngineConfig::default()).unwrap();
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].coordinates.x, 0);
    }

    #[test]
    fn raising_min_area_drops_regions() {
        let reference = DynamicImage::ImageRgb8(solid(120, 80, 160));
        let built = DynamicImage::ImageRgb8(with_rect(solid(120, 80, 160), 40, 20, 10, 10, 0));
        let config = EngineConfig {
            min_area: 100_000,
            ..EngineConfig::default()
        };
        let analysis = analyze_pair(&reference, &built, &config).unwrap();
        assert!(analysis.findings.is_empty());
        assert!(analysis.similarity.score < 1.0);
    }
}
