//! Turns a similarity map into discrete difference blobs.
//!
//! The map is rescaled to 8 bits, binarised with an automatic (Otsu) level so
//! that dissimilar pixels become foreground, and every outermost contour of
//! the resulting mask becomes one blob.

use std::collections::VecDeque;

use image::{GrayImage, ImageBuffer, Luma, imageops};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::otsu_level;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::ssim::SimilarityMap;

const FOREGROUND: u8 = 255;

/// Axis-aligned box in pixel coordinates. Serialised as the `coordinates`
/// object of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// One connected group of dissimilar pixels.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bounds: BoundingBox,
    /// Foreground pixels enclosed by the outer contour. Differs from
    /// `bounds.area()` whenever the shape is not a filled rectangle.
    pub area: u32,
    /// Bounds-sized mask, FOREGROUND inside the outer contour (holes included).
    pub interior: GrayImage,
}

impl Blob {
    /// Absolute coordinates of every pixel inside the contour.
    pub fn interior_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.interior
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == FOREGROUND)
            .map(|(x, y, _)| (self.bounds.x + x, self.bounds.y + y))
    }
}

/// Rescale the map to 0..=255 and mark low-similarity pixels as foreground,
/// with the cut point chosen by Otsu's method.
pub fn dissimilarity_mask(map: &SimilarityMap) -> GrayImage {
    let (width, height) = map.dimensions();
    let scaled = GrayImage::from_fn(width, height, |x, y| {
        let v = map.get_pixel(x, y)[0].clamp(0.0, 1.0);
        Luma([(v * 255.0) as u8])
    });
    let level = otsu_level(&scaled);
    tracing::debug!("otsu level {level}");
    GrayImage::from_fn(width, height, |x, y| {
        if scaled.get_pixel(x, y)[0] > level {
            Luma([0])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Extract outer-contour blobs from a binary mask, in contour discovery
/// order, keeping only those whose area exceeds `min_area`.
pub fn extract_blobs(mask: &GrayImage, min_area: u32) -> Vec<Blob> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // find_contours misreads components on column 0 as holes, so trace a
    // copy with a one-pixel background frame and shift the points back.
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut framed, mask, 1, 1);

    let mut blobs = Vec::new();
    for contour in find_contours::<u32>(&framed) {
        if !matches!(contour.border_type, BorderType::Outer) || contour.parent.is_some() {
            continue;
        }
        let Some(first) = contour.points.first() else {
            continue;
        };

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        for p in &contour.points {
            min_x = min_x.min(p.x - 1);
            min_y = min_y.min(p.y - 1);
            max_x = max_x.max(p.x - 1);
            max_y = max_y.max(p.y - 1);
        }
        let bounds = BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        };

        let label = labels.get_pixel(first.x - 1, first.y - 1)[0];
        let interior = fill_interior(&labels, label, &bounds);
        let area = interior
            .enumerate_pixels()
            .filter(|(x, y, p)| {
                p[0] == FOREGROUND && mask.get_pixel(bounds.x + x, bounds.y + y)[0] != 0
            })
            .count() as u32;

        if area <= min_area {
            tracing::debug!(
                "dropping blob at ({}, {}) {}x{}: area {area} <= {min_area}",
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height
            );
            continue;
        }

        blobs.push(Blob {
            bounds,
            area,
            interior,
        });
    }

    blobs
}

/// Everything inside the bounds that cannot reach the outside without
/// crossing a `label` pixel. Background is walked 4-connected so that it
/// cannot slip between diagonal neighbours of the 8-connected component.
fn fill_interior(
    labels: &ImageBuffer<Luma<u32>, Vec<u32>>,
    label: u32,
    bounds: &BoundingBox,
) -> GrayImage {
    // One pixel of guaranteed-outside padding on every side.
    let pw = bounds.width as usize + 2;
    let ph = bounds.height as usize + 2;
    let is_wall = |px: usize, py: usize| -> bool {
        if px == 0 || py == 0 || px == pw - 1 || py == ph - 1 {
            return false;
        }
        let x = bounds.x + px as u32 - 1;
        let y = bounds.y + py as u32 - 1;
        labels.get_pixel(x, y)[0] == label
    };

    let mut outside = vec![false; pw * ph];
    let mut queue = VecDeque::from([(0usize, 0usize)]);
    outside[0] = true;
    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx >= pw || ny >= ph {
                continue;
            }
            let idx = ny * pw + nx;
            if outside[idx] || is_wall(nx, ny) {
                continue;
            }
            outside[idx] = true;
            queue.push_back((nx, ny));
        }
    }

    GrayImage::from_fn(bounds.width, bounds.height, |x, y| {
        let idx = (y as usize + 1) * pw + x as usize + 1;
        if outside[idx] {
            Luma([0])
        } else {
            Luma([FOREGROUND])
        }
    })
}
