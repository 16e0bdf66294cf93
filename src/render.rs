use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::error::CompareError;
use crate::regions::{Blob, BoundingBox};
use crate::report::{DifferenceKind, OutputImages};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Box colour on the reference image.
pub const REFERENCE_BOX: Rgb<u8> = GREEN;
/// Box colour on the built image.
pub const BUILT_BOX: Rgb<u8> = RED;

pub fn fill_color(kind: DifferenceKind) -> Rgb<u8> {
    match kind {
        DifferenceKind::Missing => GREEN,
        DifferenceKind::Extra => RED,
    }
}

/// The three annotated views of one comparison.
#[derive(Debug)]
pub struct Annotations {
    pub reference: RgbImage,
    pub built: RgbImage,
    pub filled: RgbImage,
}

impl Annotations {
    pub fn new(reference: &RgbImage, built: &RgbImage) -> Self {
        Self {
            reference: reference.clone(),
            built: built.clone(),
            filled: reference.clone(),
        }
    }

    /// Box the region on both images and paint its contour interior on the
    /// filled view.
    pub fn mark(&mut self, blob: &Blob, kind: DifferenceKind, thickness: u32) {
        draw_box(&mut self.reference, &blob.bounds, REFERENCE_BOX, thickness);
        draw_box(&mut self.built, &blob.bounds, BUILT_BOX, thickness);

        let color = fill_color(kind);
        for (x, y) in blob.interior_pixels() {
            if x < self.filled.width() && y < self.filled.height() {
                self.filled.put_pixel(x, y, color);
            }
        }
    }

    /// reference | built | filled, left to right.
    pub fn side_by_side(&self) -> RgbImage {
        concat_horizontal(&[&self.reference, &self.built, &self.filled])
    }
}

/// Outline covering (x, y) to (x + w, y + h) inclusive, growing inward by
/// `thickness` pixels.
pub fn draw_box(image: &mut RgbImage, bounds: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    for inset in 0..thickness {
        let w = (bounds.width + 1).saturating_sub(2 * inset);
        let h = (bounds.height + 1).saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((bounds.x + inset) as i32, (bounds.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(image, rect, color);
    }
}

pub fn concat_horizontal(images: &[&RgbImage]) -> RgbImage {
    let width = images.iter().map(|i| i.width()).sum();
    let height = images.iter().map(|i| i.height()).max().unwrap_or(0);
    let mut canvas = RgbImage::new(width, height);
    let mut offset = 0i64;
    for img in images {
        image::imageops::replace(&mut canvas, *img, offset, 0);
        offset += img.width() as i64;
    }
    canvas
}

/// `YYYYMMDD_HHMMSS`, shared by the four files of one run.
pub fn timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Output file names for one run.
pub fn output_paths(output_dir: &Path, stamp: &str) -> OutputImages {
    let name = |kind: &str| output_dir.join(format!("{kind}_{stamp}.jpg"));
    OutputImages {
        comparison: name("comparison"),
        reference: name("figma_annotated"),
        built: name("built_annotated"),
        difference: name("difference_map"),
    }
}

/// Encode and write all four images. The output directory must already exist.
/// On failure the files already written by this call are removed again.
pub fn write_outputs(
    annotations: &Annotations,
    paths: &OutputImages,
    quality: u8,
) -> Result<(), CompareError> {
    let jobs = [
        (&paths.reference, &annotations.reference),
        (&paths.built, &annotations.built),
        (&paths.difference, &annotations.filled),
    ];
    let mut written: Vec<&Path> = Vec::with_capacity(4);

    let mut result = Ok(());
    for (path, image) in jobs {
        result = write_jpeg(image, path, quality);
        if result.is_err() {
            break;
        }
        written.push(path);
    }
    if result.is_ok() {
        result = write_jpeg(&annotations.side_by_side(), &paths.comparison, quality);
    }

    if result.is_err() {
        for path in written {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("could not remove partial output {}: {e}", path.display());
            }
        }
    }
    result
}

pub fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), CompareError> {
    let write_err = |source: std::io::Error| CompareError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|source| CompareError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(write_err)?;
    tracing::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::TimeZone;
    use image::{GrayImage, Luma};

    fn gray_canvas(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([128, 128, 128]))
    }

    #[test]
    fn box_is_drawn_on_the_outline_only() {
        let mut img = gray_canvas(50, 50);
        let b = BoundingBox {
            x: 10,
            y: 10,
            width: 20,
            height: 10,
        };
        draw_box(&mut img, &b, RED, 2);
        assert_eq!(*img.get_pixel(10, 10), RED);
        assert_eq!(*img.get_pixel(30, 20), RED);
        assert_eq!(*img.get_pixel(11, 15), RED);
        assert_eq!(*img.get_pixel(15, 15), Rgb([128, 128, 128]));
        assert_eq!(*img.get_pixel(9, 9), Rgb([128, 128, 128]));
    }

    #[test]
    fn marking_fills_contour_interior() {
        let reference = gray_canvas(40, 40);
        let built = gray_canvas(40, 40);
        let mut interior = GrayImage::new(10, 10);
        // L shape: left column and bottom row
        for i in 0..10 {
            interior.put_pixel(0, i, Luma([255]));
            interior.put_pixel(i, 9, Luma([255]));
        }
        let blob = Blob {
            bounds: BoundingBox {
                x: 5,
                y: 5,
                width: 10,
                height: 10,
            },
            area: 19,
            interior,
        };
        let mut ann = Annotations::new(&reference, &built);
        ann.mark(&blob, DifferenceKind::Missing, 1);
        assert_eq!(*ann.filled.get_pixel(5, 10), GREEN);
        assert_eq!(*ann.filled.get_pixel(10, 14), GREEN);
        assert_eq!(*ann.filled.get_pixel(10, 10), Rgb([128, 128, 128]));
        assert_eq!(*ann.reference.get_pixel(5, 5), REFERENCE_BOX);
        assert_eq!(*ann.built.get_pixel(5, 5), BUILT_BOX);
    }

    #[test]
    fn side_by_side_is_three_wide() {
        let ann = Annotations::new(&gray_canvas(30, 20), &gray_canvas(30, 20));
        let combined = ann.side_by_side();
        assert_eq!(combined.dimensions(), (90, 20));
    }

    #[test]
    fn names_embed_the_timestamp() {
        let at = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let stamp = timestamp(at);
        assert_eq!(stamp, "20260304_050607");
        let paths = output_paths(Path::new("/tmp/out"), &stamp);
        assert_eq!(paths.comparison, PathBuf::from("/tmp/out/comparison_20260304_050607.jpg"));
        assert_eq!(paths.reference, PathBuf::from("/tmp/out/figma_annotated_20260304_050607.jpg"));
        assert_eq!(paths.built, PathBuf::from("/tmp/out/built_annotated_20260304_050607.jpg"));
        assert_eq!(paths.difference, PathBuf::from("/tmp/out/difference_map_20260304_050607.jpg"));
    }

    #[test]
    fn failed_run_leaves_no_partial_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let ann = Annotations::new(&gray_canvas(20, 20), &gray_canvas(20, 20));
        let mut paths = output_paths(dir.path(), "20260101_000000");
        // A directory in place of the third file makes that write fail.
        std::fs::create_dir(&paths.difference).unwrap();
        paths.comparison = dir.path().join("comparison.jpg");

        let err = write_outputs(&ann, &paths, 90).unwrap_err();
        assert!(matches!(err, CompareError::Write { .. }));
        assert!(!paths.reference.exists());
        assert!(!paths.built.exists());
        assert!(!paths.comparison.exists());
        assert!(paths.difference.is_dir());
    }

    #[test]
    fn successful_run_writes_all_four() {
        let dir = tempfile::tempdir().unwrap();
        let ann = Annotations::new(&gray_canvas(20, 20), &gray_canvas(20, 20));
        let paths = output_paths(dir.path(), "20260101_000000");
        write_outputs(&ann, &paths, 90).unwrap();
        for path in [&paths.reference, &paths.built, &paths.difference, &paths.comparison] {
            assert!(path.is_file(), "{}", path.display());
        }
    }

    #[test]
    fn writing_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("x.jpg");
        let err = write_jpeg(&gray_canvas(8, 8), &path, 90).unwrap_err();
        assert!(matches!(err, CompareError::Write { .. }));
    }
}
