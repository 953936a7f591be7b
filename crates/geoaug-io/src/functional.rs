use std::path::Path;

use geoaug_image::{Image, ImageSize};

use crate::error::IoError;
use crate::raster::TiffRaster;

/// Reads a raster as an 8-bit RGB image.
///
/// TIFF files are decoded with the `tiff` crate, any other format with the
/// `image` crate. Grayscale rasters are expanded to three equal bands, palette
/// rasters are looked up in their color map, JPEG compressed YCbCr TIFFs are
/// converted to RGB and an alpha band is dropped.
///
/// # Arguments
///
/// * `file_path` - The path to a valid raster file.
///
/// # Returns
///
/// The decoded RGB image.
pub fn read_image_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let image = if crate::is_tiff_path(file_path) {
        let raster = TiffRaster::read(file_path)?;
        log::debug!(
            "decoded {} ({}, {:?})",
            file_path.display(),
            raster.size,
            raster.layout
        );
        raster.into_rgb8()?
    } else {
        let img = image::open(file_path)?.into_rgb8();
        let size = ImageSize {
            width: img.width() as usize,
            height: img.height() as usize,
        };
        log::debug!("decoded {} ({})", file_path.display(), size);
        Image::new(size, img.into_raw())?
    };

    Ok(image)
}

/// Reads a label raster as a single band 8-bit image.
///
/// The raster is decoded like [`read_image_rgb8`] and its first band is kept,
/// so class values stored in band 1 are preserved untouched. Palette TIFFs
/// keep their indices rather than the colors they map to.
pub fn read_image_mono8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    let file_path = file_path.as_ref();
    if crate::is_tiff_path(file_path) && file_path.exists() {
        return TiffRaster::read(file_path)?.into_mono8();
    }

    Ok(read_image_rgb8(file_path)?.channel(0)?)
}
