use std::path::PathBuf;

/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(PathBuf),

    /// Error to open or write the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] geoaug_image::ImageError),

    /// Error to decode a non TIFF image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to decode or encode the TIFF image.
    #[error("Error with TIFF decoding/encoding. {0}")]
    TiffDecodingError(#[from] tiff::TiffError),

    /// The raster uses a sample type or band layout that is not supported.
    #[error("Unsupported raster layout: {0}")]
    UnsupportedRasterLayout(String),

    /// A TIFF strip could not be decompressed.
    #[error("Failed to decode strip {0}: {1}")]
    CorruptStrip(usize, String),

    /// A GeoTIFF tag holds a value that cannot be interpreted.
    #[error("Malformed GeoTIFF tag {0}: {1}")]
    InvalidGeoTag(&'static str, String),

    /// The band index does not exist in the dataset.
    #[error("Band {0} is out of range for a dataset with {1} bands")]
    BandIndexOutOfBounds(usize, usize),

    /// A band was never written before flushing.
    #[error("Band {0} was not written before flushing {1}")]
    MissingBand(usize, PathBuf),

    /// Band data does not have the dataset size.
    #[error("Band size {0} does not match the dataset size {1}")]
    BandSizeMismatch(geoaug_image::ImageSize, geoaug_image::ImageSize),
}
