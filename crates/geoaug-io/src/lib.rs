#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for I/O operations.
///
/// Defines [`error::IoError`] variants for file access, decoding failures and
/// unsupported raster layouts.
pub mod error;

/// High-level raster reading functions.
///
/// Reads images and labels from TIFF and any format the `image` crate knows.
pub mod functional;

/// GeoTIFF georeferencing tags and the dataset writer.
pub mod geotiff;

/// Spatial metadata attached to a raster.
pub mod metadata;

mod raster;

pub use crate::error::IoError;
pub use crate::functional::{read_image_mono8, read_image_rgb8};
pub use crate::geotiff::{
    read_raster_metadata, Compression, CreationOptions, GeoTiffDataset, Predictor,
};
pub use crate::metadata::{
    ColorInterpretation, GeoKeyDirectory, GeoTransform, ModelKind, Projection, RasterMetadata,
};

pub(crate) fn is_tiff_path(path: &std::path::Path) -> bool {
    path.extension().is_some_and(|ext| {
        ext.eq_ignore_ascii_case("tiff") || ext.eq_ignore_ascii_case("tif")
    })
}
