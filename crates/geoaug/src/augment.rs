use std::path::{Path, PathBuf};

use geoaug_image::Image;
use geoaug_io::{read_image_mono8, read_image_rgb8, read_raster_metadata};

use crate::config::AugmentConfig;
use crate::error::AugmentError;
use crate::seed::{SeedSource, TimeSeedSource};
use crate::transform::TransformStream;
use crate::writer::{write_pair, OutputDirs};

/// Dataset directory used when the caller does not name one.
pub const DEFAULT_DATASET_ID: &str = "anonymous_dataset";

/// One augmentation job: an image/label pair and where the results go.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentRequest {
    /// Path of the source image.
    pub image_path: PathBuf,
    /// Path of the source label.
    pub label_path: PathBuf,
    /// Number of augmented pairs to produce.
    pub count: usize,
    /// Seed of the transform streams; drawn from the seed source when `None`.
    pub seed: Option<u64>,
    /// Root directory for the GeoTIFF outputs; nothing is written when `None`.
    pub output_dir: Option<PathBuf>,
    /// Sub directory of `output_dir` grouping the outputs.
    pub dataset_id: String,
}

impl AugmentRequest {
    /// Create a request producing `count` pairs in memory only.
    pub fn new(
        image_path: impl Into<PathBuf>,
        label_path: impl Into<PathBuf>,
        count: usize,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            label_path: label_path.into(),
            count,
            seed: None,
            output_dir: None,
            dataset_id: DEFAULT_DATASET_ID.to_string(),
        }
    }

    /// Use a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Write the pairs under `output_dir`.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// Group the outputs under `dataset_id`.
    pub fn with_dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = dataset_id.into();
        self
    }
}

/// Result of an augmentation job.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentOutput {
    /// The seed actually used, to replay the job.
    pub seed: u64,
    /// The augmented images, in generation order.
    pub images: Vec<Image<u8, 3>>,
    /// The augmented labels; `labels[i]` pairs with `images[i]`.
    pub labels: Vec<Image<u8, 1>>,
}

/// Produces seed-synchronised augmentations of image/label pairs.
///
/// # Example
///
/// ```no_run
/// use geoaug::{AugmentConfig, AugmentRequest, Augmentor};
///
/// let augmentor = Augmentor::new(AugmentConfig::default().with_rotation_range(15.0))?;
/// let request = AugmentRequest::new("tile.tif", "tile_label.tif", 10)
///     .with_seed(42)
///     .with_output_dir("augmented")
///     .with_dataset_id("buildings");
///
/// let output = augmentor.augment(&request)?;
/// assert_eq!(output.images.len(), 10);
/// # Ok::<(), geoaug::AugmentError>(())
/// ```
pub struct Augmentor {
    config: AugmentConfig,
    seed_source: Box<dyn SeedSource>,
}

impl Augmentor {
    /// Create an augmentor drawing unseeded runs from the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`AugmentError::InvalidConfig`] if a range of `config` is invalid.
    pub fn new(config: AugmentConfig) -> Result<Self, AugmentError> {
        config.validate()?;
        Ok(Self {
            config,
            seed_source: Box::new(TimeSeedSource),
        })
    }

    /// Replace the source of seeds for requests without a seed.
    pub fn with_seed_source(mut self, seed_source: impl SeedSource + 'static) -> Self {
        self.seed_source = Box::new(seed_source);
        self
    }

    /// The transform configuration.
    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// The explicit seed, or a new one from the seed source.
    pub fn resolve_seed(&self, seed: Option<u64>) -> u64 {
        match seed {
            Some(seed) => seed,
            None => {
                let seed = self.seed_source.seed();
                log::info!("no augmentation seed given, generated {seed}");
                seed
            }
        }
    }

    /// Augment decoded rasters `count` times with the streams seeded by `seed`.
    pub fn augment_images(
        &self,
        image: &Image<u8, 3>,
        label: &Image<u8, 1>,
        count: usize,
        seed: u64,
    ) -> Result<(Vec<Image<u8, 3>>, Vec<Image<u8, 1>>), AugmentError> {
        let image_stream = TransformStream::new(seed, &self.config, self.config.image_view());
        let label_stream = TransformStream::new(seed, &self.config, self.config.label_view());

        let mut images = Vec::with_capacity(count);
        let mut labels = Vec::with_capacity(count);
        for (image_params, label_params) in image_stream.zip(label_stream).take(count) {
            images.push(image_params.apply(image, &self.config.image_view())?);
            labels.push(label_params.apply(label, &self.config.label_view())?);
        }

        Ok((images, labels))
    }

    /// Run `request`: decode the pair, augment it and write the results if asked.
    pub fn augment(&self, request: &AugmentRequest) -> Result<AugmentOutput, AugmentError> {
        let seed = self.resolve_seed(request.seed);

        let image = read_image_rgb8(&request.image_path)?;
        let label = read_image_mono8(&request.label_path)?;

        let (images, labels) = self.augment_images(&image, &label, request.count, seed)?;

        if let Some(output_dir) = &request.output_dir {
            let dirs = OutputDirs::prepare(output_dir, &request.dataset_id)?;
            let metadata = read_raster_metadata(&request.image_path)?;
            let image_stem = file_stem(&request.image_path)?;
            let label_stem = file_stem(&request.label_path)?;

            for (i, (image, label)) in images.iter().zip(&labels).enumerate() {
                let image_path = dirs.image_path(image_stem, i);
                let label_path = dirs.label_path(label_stem, i);
                write_pair(&metadata, image, label, &image_path, &label_path)?;
                log::debug!(
                    "wrote {} and {}",
                    image_path.display(),
                    label_path.display()
                );
            }
        }

        log::info!(
            "augmented {} {} times with seed {seed}",
            request.image_path.display(),
            request.count
        );

        Ok(AugmentOutput {
            seed,
            images,
            labels,
        })
    }
}

fn file_stem(path: &Path) -> Result<&str, AugmentError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| AugmentError::InvalidPath(path.to_path_buf()))
}

/// Augment an image/label pair with the default configuration.
///
/// # Arguments
///
/// * `image_path` - Path of the source image.
/// * `label_path` - Path of the source label.
/// * `count` - Number of augmented pairs.
/// * `seed` - Seed of the transforms; drawn from the wall clock when `None`.
/// * `output_dir` - Root directory for GeoTIFF outputs; nothing is written when `None`.
/// * `dataset_id` - Sub directory of `output_dir`, [`DEFAULT_DATASET_ID`] when `None`.
pub fn augment(
    image_path: impl AsRef<Path>,
    label_path: impl AsRef<Path>,
    count: usize,
    seed: Option<u64>,
    output_dir: Option<&Path>,
    dataset_id: Option<&str>,
) -> Result<AugmentOutput, AugmentError> {
    let mut request = AugmentRequest::new(image_path.as_ref(), label_path.as_ref(), count)
        .with_dataset_id(dataset_id.unwrap_or(DEFAULT_DATASET_ID));
    request.seed = seed;
    request.output_dir = output_dir.map(Path::to_path_buf);

    Augmentor::new(AugmentConfig::default())?.augment(&request)
}

#[cfg(test)]
mod tests {
    use geoaug_image::{Image, ImageSize};

    use super::{AugmentRequest, Augmentor, DEFAULT_DATASET_ID};
    use crate::config::AugmentConfig;
    use crate::error::AugmentError;
    use crate::seed::FixedSeed;

    fn pair() -> Result<(Image<u8, 3>, Image<u8, 1>), AugmentError> {
        let size = ImageSize {
            width: 4,
            height: 3,
        };
        let image = Image::new(size, (0..36).map(|v| v as u8 * 7).collect())?;
        let label = Image::new(size, (0..12).map(|v| (v % 3) as u8).collect())?;
        Ok((image, label))
    }

    #[test]
    fn request_defaults() {
        let request = AugmentRequest::new("a.tif", "b.tif", 3);
        assert_eq!(request.seed, None);
        assert_eq!(request.output_dir, None);
        assert_eq!(request.dataset_id, DEFAULT_DATASET_ID);
        assert_eq!(request.with_seed(9).seed, Some(9));
    }

    #[test]
    fn resolve_seed_prefers_explicit() -> Result<(), AugmentError> {
        let augmentor = Augmentor::new(AugmentConfig::default())?.with_seed_source(FixedSeed(5));
        assert_eq!(augmentor.resolve_seed(Some(1)), 1);
        assert_eq!(augmentor.resolve_seed(None), 5);
        Ok(())
    }

    #[test]
    fn invalid_config_rejected() {
        let config = AugmentConfig::default().with_rotation_range(-5.0);
        assert!(matches!(
            Augmentor::new(config),
            Err(AugmentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn augment_images_deterministic() -> Result<(), AugmentError> {
        let (image, label) = pair()?;
        let augmentor = Augmentor::new(AugmentConfig::default().with_rotation_range(30.0))?;

        let (images_a, labels_a) = augmentor.augment_images(&image, &label, 5, 11)?;
        let (images_b, labels_b) = augmentor.augment_images(&image, &label, 5, 11)?;
        assert_eq!(images_a, images_b);
        assert_eq!(labels_a, labels_b);
        assert_eq!(images_a.len(), 5);

        for label in &labels_a {
            assert!(label.as_slice().iter().all(|v| *v <= 2));
        }
        Ok(())
    }

    #[test]
    fn augment_zero_count() -> Result<(), AugmentError> {
        let (image, label) = pair()?;
        let augmentor = Augmentor::new(AugmentConfig::default())?;
        let (images, labels) = augmentor.augment_images(&image, &label, 0, 1)?;
        assert!(images.is_empty());
        assert!(labels.is_empty());
        Ok(())
    }
}
