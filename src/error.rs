use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a single comparison run. There is no partial
/// success: any of these means no result and no output images.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("cannot decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {} has zero extent ({width}x{height})", path.display())]
    EmptyImage {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("{side} image has zero extent ({width}x{height})")]
    EmptyInput {
        side: &'static str,
        width: u32,
        height: u32,
    },

    #[error("dimension mismatch: reference {}x{}, built {}x{}", .reference.0, .reference.1, .built.0, .built.1)]
    DimensionMismatch {
        reference: (u32, u32),
        built: (u32, u32),
    },

    #[error("image {width}x{height} is smaller than the {window}x{window} similarity window")]
    TooSmall { width: u32, height: u32, window: u32 },

    #[error("difference region {id} has an empty crop")]
    EmptyRegion { id: usize },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
