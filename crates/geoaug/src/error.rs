use std::path::PathBuf;

use geoaug_image::{ImageError, ImageSize};
use geoaug_io::IoError;

/// An error type for the augmentation.
#[derive(thiserror::Error, Debug)]
pub enum AugmentError {
    /// Reading or writing a raster failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// An image operation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The transform configuration is not usable.
    #[error("Invalid augmentation config: {0}")]
    InvalidConfig(String),

    /// The path has no file stem to derive output names from.
    #[error("Path has no file name: {0}")]
    InvalidPath(PathBuf),

    /// An augmented raster does not have the size of the source it is
    /// georeferenced from.
    #[error("Raster size {0} does not match the source size {1}")]
    SizeMismatch(ImageSize, ImageSize),

    /// An output directory could not be created.
    #[error("Failed to create output directory {0}. {1}")]
    OutputDir(PathBuf, #[source] std::io::Error),
}
