use std::fs;
use std::path::{Path, PathBuf};

use geoaug_image::Image;
use geoaug_io::{CreationOptions, GeoTiffDataset, RasterMetadata};

use crate::error::AugmentError;

/// The `image/` and `label/` directories of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    /// Directory of the augmented images.
    pub image: PathBuf,
    /// Directory of the augmented labels.
    pub label: PathBuf,
}

impl OutputDirs {
    /// Create `output_dir/dataset_id/image` and `output_dir/dataset_id/label`.
    ///
    /// Existing directories are kept, so concurrent runs on the same dataset
    /// can call this at the same time.
    pub fn prepare(output_dir: impl AsRef<Path>, dataset_id: &str) -> Result<Self, AugmentError> {
        let root = output_dir.as_ref().join(dataset_id);
        let dirs = Self {
            image: root.join("image"),
            label: root.join("label"),
        };

        for dir in [&dirs.image, &dirs.label] {
            fs::create_dir_all(dir).map_err(|e| AugmentError::OutputDir(dir.clone(), e))?;
        }

        Ok(dirs)
    }

    /// Path of augmented image `index` derived from the input stem.
    pub fn image_path(&self, stem: &str, index: usize) -> PathBuf {
        self.image.join(file_name(stem, index))
    }

    /// Path of augmented label `index` derived from the input stem.
    pub fn label_path(&self, stem: &str, index: usize) -> PathBuf {
        self.label.join(file_name(stem, index))
    }
}

fn file_name(stem: &str, index: usize) -> String {
    format!("{stem}_{index:03}.tif")
}

/// Write an augmented pair as two GeoTIFFs sharing the georeferencing of `metadata`.
///
/// The image is stored as a three band JPEG compressed YCbCr raster, the label
/// as a single band gray raster with LZW compression and horizontal predictor.
/// Both files are complete and closed when the function returns.
///
/// # Arguments
///
/// * `metadata` - Georeferencing copied to both outputs.
/// * `image` - The augmented image.
/// * `label` - The augmented label.
/// * `image_path` - Destination of the image.
/// * `label_path` - Destination of the label.
///
/// # Errors
///
/// Returns [`AugmentError::SizeMismatch`] if `image` or `label` does not have
/// `metadata.size`.
pub fn write_pair(
    metadata: &RasterMetadata,
    image: &Image<u8, 3>,
    label: &Image<u8, 1>,
    image_path: impl AsRef<Path>,
    label_path: impl AsRef<Path>,
) -> Result<(), AugmentError> {
    for size in [image.size(), label.size()] {
        if size != metadata.size {
            return Err(AugmentError::SizeMismatch(size, metadata.size));
        }
    }

    let mut image_ds = GeoTiffDataset::create(image_path, metadata.size, CreationOptions::rgb())?;
    image_ds.set_geo_transform(metadata.geo_transform);
    image_ds.set_projection(metadata.projection.clone());
    for (i, band) in image.split_channels()?.iter().enumerate() {
        image_ds.write_band(i, band)?;
    }

    let mut label_ds = GeoTiffDataset::create(label_path, metadata.size, CreationOptions::gray())?;
    label_ds.set_geo_transform(metadata.geo_transform);
    label_ds.set_projection(metadata.projection.clone());
    label_ds.write_band(0, label)?;

    image_ds.flush()?;
    label_ds.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use geoaug_image::{Image, ImageSize};
    use geoaug_io::{
        read_image_mono8, read_image_rgb8, read_raster_metadata, ColorInterpretation,
        GeoTransform, Projection, RasterMetadata,
    };

    use super::{write_pair, OutputDirs};
    use crate::error::AugmentError;

    #[test]
    fn output_dirs_layout() -> Result<(), AugmentError> {
        let tmp_dir = tempfile::tempdir().map_err(geoaug_io::IoError::from)?;
        let dirs = OutputDirs::prepare(tmp_dir.path(), "tiles")?;
        assert!(dirs.image.is_dir());
        assert!(dirs.label.is_dir());
        assert_eq!(
            dirs.image_path("scene", 7),
            tmp_dir.path().join("tiles/image/scene_007.tif")
        );
        assert_eq!(
            dirs.label_path("scene", 1234),
            tmp_dir.path().join("tiles/label/scene_1234.tif")
        );

        // second call on existing directories
        assert_eq!(OutputDirs::prepare(tmp_dir.path(), "tiles")?, dirs);
        Ok(())
    }

    fn utm_metadata(size: ImageSize) -> RasterMetadata {
        RasterMetadata {
            size,
            geo_transform: GeoTransform::north_up(400_000.0, 7_000_000.0, 0.5, -0.5),
            projection: Projection::new("PROJCS[\"WGS 84 / UTM zone 32N\"]"),
            bands: vec![ColorInterpretation::Red],
        }
    }

    #[test]
    fn write_pair_roundtrip() -> Result<(), AugmentError> {
        let tmp_dir = tempfile::tempdir().map_err(geoaug_io::IoError::from)?;
        let size = ImageSize {
            width: 6,
            height: 4,
        };
        let metadata = utm_metadata(size);
        let image = Image::<u8, 3>::from_size_val(size, 100)?;
        let label = Image::<u8, 1>::new(size, (0..24).map(|i| (i % 3) as u8).collect())?;

        let image_path = tmp_dir.path().join("a.tif");
        let label_path = tmp_dir.path().join("b.tif");
        write_pair(&metadata, &image, &label, &image_path, &label_path)?;

        // the image is lossy, the label exact
        let decoded = read_image_rgb8(&image_path)?;
        assert_eq!(decoded.size(), size);
        assert!(decoded.as_slice().iter().all(|v| v.abs_diff(100) <= 2));
        assert_eq!(read_image_mono8(&label_path)?, label);

        let image_meta = read_raster_metadata(&image_path)?;
        let label_meta = read_raster_metadata(&label_path)?;
        assert_eq!(image_meta.geo_transform, metadata.geo_transform);
        assert_eq!(label_meta.projection.as_str(), metadata.projection.as_str());
        assert_eq!(image_meta.bands.len(), 3);
        assert_eq!(label_meta.bands, vec![ColorInterpretation::Gray]);
        Ok(())
    }

    #[test]
    fn write_pair_rejects_foreign_size() -> Result<(), AugmentError> {
        let tmp_dir = tempfile::tempdir().map_err(geoaug_io::IoError::from)?;
        let size = ImageSize {
            width: 3,
            height: 2,
        };
        let other = ImageSize {
            width: 2,
            height: 3,
        };
        let image_path = tmp_dir.path().join("a.tif");
        let label_path = tmp_dir.path().join("b.tif");

        let result = write_pair(
            &utm_metadata(size),
            &Image::<u8, 3>::from_size_val(other, 0)?,
            &Image::<u8, 1>::from_size_val(other, 0)?,
            &image_path,
            &label_path,
        );
        assert!(matches!(
            result,
            Err(AugmentError::SizeMismatch(s, m)) if s == other && m == size
        ));

        let result = write_pair(
            &utm_metadata(size),
            &Image::<u8, 3>::from_size_val(size, 0)?,
            &Image::<u8, 1>::from_size_val(other, 0)?,
            &image_path,
            &label_path,
        );
        assert!(matches!(result, Err(AugmentError::SizeMismatch(..))));
        assert!(!image_path.exists());
        Ok(())
    }
}
