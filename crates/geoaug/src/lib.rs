#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Augmentation of one image/label pair.
pub mod augment;

/// Transform configuration and the image and label views derived from it.
pub mod config;

/// Error types for the augmentation.
pub mod error;

/// Sources of augmentation seeds.
pub mod seed;

/// Seeded transform streams and their application to rasters.
pub mod transform;

/// Persistence of augmented pairs as GeoTIFF files.
pub mod writer;

pub use crate::augment::{augment, AugmentOutput, AugmentRequest, Augmentor, DEFAULT_DATASET_ID};
pub use crate::config::{AugmentConfig, TransformKind, TransformView, LABEL_TRANSFORMS};
pub use crate::error::AugmentError;
pub use crate::seed::{FixedSeed, SeedSource, TimeSeedSource, MAX_SEED};
pub use crate::transform::{TransformParams, TransformStream};
pub use crate::writer::{write_pair, OutputDirs};

/// Re-export of the image container.
pub use geoaug_image as image;
/// Re-export of the image operations.
pub use geoaug_imgproc as imgproc;
/// Re-export of the raster I/O.
pub use geoaug_io as io;
