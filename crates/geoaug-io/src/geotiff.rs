use std::{
    fs,
    io::{BufReader, Cursor, Read, Seek, Write},
    path::{Path, PathBuf},
};

use geoaug_image::{Image, ImageSize};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageDecoder};
use tiff::{
    decoder::{ifd::Value, Decoder},
    encoder::{colortype, compression, DirectoryEncoder, TiffEncoder, TiffKindStandard},
    tags::Tag,
};

use crate::error::IoError;
use crate::metadata::{
    ColorInterpretation, GeoKeyDirectory, GeoTransform, ModelKind, Projection, RasterMetadata,
    GEO_ASCII_PARAMS_TAG, GEO_KEY_DIRECTORY_VERSION, GT_CITATION_GEO_KEY, GT_MODEL_TYPE_GEO_KEY,
    GT_RASTER_TYPE_GEO_KEY, MODEL_TYPE_GEOGRAPHIC, MODEL_TYPE_PROJECTED, RASTER_PIXEL_IS_AREA,
    RASTER_PIXEL_IS_POINT,
};
use crate::raster::TiffLayout;

/// JPEG quality of [`CreationOptions::rgb`].
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

const JPEG_ROWS_PER_STRIP: usize = 256;
const COMPRESSION_JPEG: u16 = 7;
const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;
const PHOTOMETRIC_YCBCR: u16 = 6;
const YCBCR_SUBSAMPLING_TAG: u16 = 530;

/// Compression scheme of a written GeoTIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Raw strips.
    None,
    /// Lossless LZW.
    Lzw,
    /// Lossless zlib/deflate.
    Deflate,
    /// Lossy baseline JPEG, one stream per strip. Three band rasters are
    /// stored as YCbCr.
    Jpeg {
        /// Encoder quality, 1 to 100.
        quality: u8,
    },
}

/// Predictor applied to the samples before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    /// Samples are stored as is.
    None,
    /// Horizontal differencing (TIFF predictor 2).
    Horizontal,
}

/// Creation options of a [`GeoTiffDataset`]: band roles and compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationOptions {
    /// Role of every band; the band count follows from it.
    pub bands: Vec<ColorInterpretation>,
    /// Compression of the strips.
    pub compression: Compression,
    /// Predictor used together with the compression.
    pub predictor: Predictor,
}

impl CreationOptions {
    /// Three band 8-bit raster for imagery, JPEG compressed as YCbCr.
    pub fn rgb() -> Self {
        Self {
            bands: rgb_bands(),
            compression: Compression::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            predictor: Predictor::None,
        }
    }

    /// Single band 8-bit grayscale raster for categorical labels.
    pub fn gray() -> Self {
        Self {
            bands: vec![ColorInterpretation::Gray],
            compression: Compression::Lzw,
            predictor: Predictor::Horizontal,
        }
    }

    /// Replace the compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// A GeoTIFF being created.
///
/// Mirrors the create / set georeferencing / write bands / flush sequence of
/// classic raster libraries. Nothing reaches the file until [`GeoTiffDataset::flush`],
/// which consumes the dataset and releases the file handle.
///
/// # Example
///
/// ```no_run
/// use geoaug_image::{Image, ImageSize};
/// use geoaug_io::{CreationOptions, GeoTiffDataset, GeoTransform, Projection};
///
/// let size = ImageSize { width: 256, height: 256 };
/// let band = Image::<u8, 1>::from_size_val(size, 0)?;
///
/// let mut dataset = GeoTiffDataset::create("label.tif", size, CreationOptions::gray())?;
/// dataset.set_geo_transform(GeoTransform::north_up(500_000.0, 6_600_000.0, 0.2, -0.2));
/// dataset.set_projection(Projection::new("EPSG:25833"));
/// dataset.write_band(0, &band)?;
/// dataset.flush()?;
/// # Ok::<(), geoaug_io::IoError>(())
/// ```
#[derive(Debug)]
pub struct GeoTiffDataset {
    path: PathBuf,
    file: fs::File,
    size: ImageSize,
    options: CreationOptions,
    geo_transform: GeoTransform,
    projection: Projection,
    bands: Vec<Option<Image<u8, 1>>>,
}

impl GeoTiffDataset {
    /// Create the file and an empty dataset of the given size.
    ///
    /// # Errors
    ///
    /// Fails if the band layout is not one band or three bands, if the size is
    /// empty, if a predictor is combined with JPEG or if the file cannot be
    /// created.
    pub fn create(
        path: impl AsRef<Path>,
        size: ImageSize,
        options: CreationOptions,
    ) -> Result<Self, IoError> {
        if !matches!(options.bands.len(), 1 | 3) {
            return Err(IoError::UnsupportedRasterLayout(format!(
                "{} bands",
                options.bands.len()
            )));
        }
        if size.area() == 0 {
            return Err(IoError::UnsupportedRasterLayout(format!("empty raster {size}")));
        }
        if let Compression::Jpeg { quality } = options.compression {
            if options.predictor != Predictor::None {
                return Err(IoError::UnsupportedRasterLayout(
                    "predictor with JPEG compression".to_string(),
                ));
            }
            if !(1..=100).contains(&quality) {
                return Err(IoError::UnsupportedRasterLayout(format!(
                    "JPEG quality {quality}"
                )));
            }
        }

        let path = path.as_ref().to_path_buf();
        let file = fs::File::create(&path)?;

        Ok(Self {
            path,
            file,
            size,
            bands: vec![None; options.bands.len()],
            options,
            geo_transform: GeoTransform::default(),
            projection: Projection::default(),
        })
    }

    /// Set the pixel to world mapping.
    pub fn set_geo_transform(&mut self, geo_transform: GeoTransform) {
        self.geo_transform = geo_transform;
    }

    /// Set the coordinate reference system.
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    /// Number of bands of the dataset.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Store the data of band `index` (zero based).
    pub fn write_band(&mut self, index: usize, band: &Image<u8, 1>) -> Result<(), IoError> {
        let band_count = self.bands.len();
        let slot = self
            .bands
            .get_mut(index)
            .ok_or(IoError::BandIndexOutOfBounds(index, band_count))?;
        if band.size() != self.size {
            return Err(IoError::BandSizeMismatch(band.size(), self.size));
        }
        *slot = Some(band.clone());
        Ok(())
    }

    /// Encode the dataset, write it to disk and release the file.
    pub fn flush(mut self) -> Result<(), IoError> {
        let mut planes = Vec::with_capacity(self.bands.len());
        for (i, band) in self.bands.iter_mut().enumerate() {
            let band = band
                .take()
                .ok_or_else(|| IoError::MissingBand(i, self.path.clone()))?;
            planes.push(band);
        }

        let mut data = interleave(&planes);
        if self.options.predictor == Predictor::Horizontal {
            horizontal_differencing(&mut data, self.size.width, planes.len());
        }

        let geo_tags = GeoTags::new(&self.geo_transform, &self.projection)?;
        let mut buffer = Cursor::new(Vec::new());
        match (self.options.compression, planes.len()) {
            (Compression::Jpeg { quality }, bands) => {
                encode_jpeg(&mut buffer, self.size, &data, bands, quality, &geo_tags)?
            }
            (_, 1) => {
                encode::<colortype::Gray8>(&mut buffer, self.size, &data, &self.options, &geo_tags)?
            }
            (_, 3) => {
                encode::<colortype::RGB8>(&mut buffer, self.size, &data, &self.options, &geo_tags)?
            }
            (_, n) => return Err(IoError::UnsupportedRasterLayout(format!("{n} bands"))),
        }

        self.file.write_all(buffer.get_ref())?;
        self.file.sync_all()?;
        log::debug!(
            "wrote {} ({} bands, {})",
            self.path.display(),
            planes.len(),
            self.size
        );

        Ok(())
    }
}

/// (band, row, col) planes to (row, col, band) chunky samples.
fn interleave(planes: &[Image<u8, 1>]) -> Vec<u8> {
    let pixels = planes.first().map_or(0, |p| p.size().area());
    let mut data = Vec::with_capacity(pixels * planes.len());
    for i in 0..pixels {
        data.extend(planes.iter().map(|p| p.as_slice()[i]));
    }
    data
}

fn horizontal_differencing(data: &mut [u8], cols: usize, samples: usize) {
    for row in data.chunks_exact_mut(cols * samples) {
        for i in (samples..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - samples]);
        }
    }
}

fn encode<C>(
    buffer: &mut Cursor<Vec<u8>>,
    size: ImageSize,
    data: &[u8],
    options: &CreationOptions,
    geo_tags: &GeoTags,
) -> Result<(), IoError>
where
    C: colortype::ColorType<Inner = u8>,
{
    match options.compression {
        Compression::None => encode_with::<C, _>(
            buffer,
            size,
            data,
            compression::Uncompressed::default(),
            options.predictor,
            geo_tags,
        ),
        Compression::Lzw => encode_with::<C, _>(
            buffer,
            size,
            data,
            compression::Lzw::default(),
            options.predictor,
            geo_tags,
        ),
        Compression::Deflate => encode_with::<C, _>(
            buffer,
            size,
            data,
            compression::Deflate::default(),
            options.predictor,
            geo_tags,
        ),
        Compression::Jpeg { .. } => Err(IoError::UnsupportedRasterLayout(
            "JPEG strips are not written by the generic encoder".to_string(),
        )),
    }
}

fn encode_with<C, D>(
    buffer: &mut Cursor<Vec<u8>>,
    size: ImageSize,
    data: &[u8],
    compression: D,
    predictor: Predictor,
    geo_tags: &GeoTags,
) -> Result<(), IoError>
where
    C: colortype::ColorType<Inner = u8>,
    D: compression::Compression,
{
    let mut encoder = TiffEncoder::new(buffer)?;
    let mut image = encoder.new_image_with_compression::<C, D>(
        size.width as u32,
        size.height as u32,
        compression,
    )?;

    let dir = image.encoder();
    geo_tags.write(dir)?;
    if predictor == Predictor::Horizontal {
        dir.write_tag(Tag::Predictor, 2u16)?;
    }

    image.write_data(data)?;
    Ok(())
}

/// Chunky samples as strips of standalone baseline JPEG streams.
fn encode_jpeg(
    buffer: &mut Cursor<Vec<u8>>,
    size: ImageSize,
    data: &[u8],
    bands: usize,
    quality: u8,
    geo_tags: &GeoTags,
) -> Result<(), IoError> {
    let (color, photometric) = match bands {
        1 => (ExtendedColorType::L8, PHOTOMETRIC_BLACK_IS_ZERO),
        3 => (ExtendedColorType::Rgb8, PHOTOMETRIC_YCBCR),
        n => return Err(IoError::UnsupportedRasterLayout(format!("{n} bands"))),
    };
    let too_large = |_| IoError::UnsupportedRasterLayout(format!("{size} exceeds 4 GiB"));

    let row_len = size.width * bands;
    let rows_per_strip = JPEG_ROWS_PER_STRIP.min(size.height);

    let mut encoder = TiffEncoder::new(buffer)?;
    let mut dir = encoder.new_directory()?;

    let mut offsets = Vec::new();
    let mut byte_counts = Vec::new();
    for strip in data.chunks(rows_per_strip * row_len) {
        let rows = strip.len() / row_len;
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
            strip,
            size.width as u32,
            rows as u32,
            color,
        )?;
        let offset = dir.write_data(&jpeg[..])?;
        offsets.push(u32::try_from(offset).map_err(too_large)?);
        byte_counts.push(u32::try_from(jpeg.len()).map_err(too_large)?);
    }

    dir.write_tag(Tag::ImageWidth, size.width as u32)?;
    dir.write_tag(Tag::ImageLength, size.height as u32)?;
    dir.write_tag(Tag::BitsPerSample, &vec![8u16; bands][..])?;
    dir.write_tag(Tag::Compression, COMPRESSION_JPEG)?;
    dir.write_tag(Tag::PhotometricInterpretation, photometric)?;
    dir.write_tag(Tag::StripOffsets, &offsets[..])?;
    dir.write_tag(Tag::SamplesPerPixel, bands as u16)?;
    dir.write_tag(Tag::RowsPerStrip, rows_per_strip as u32)?;
    dir.write_tag(Tag::StripByteCounts, &byte_counts[..])?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    if photometric == PHOTOMETRIC_YCBCR {
        // the JPEG encoder keeps full resolution chroma
        dir.write_tag(Tag::Unknown(YCBCR_SUBSAMPLING_TAG), &[1u16, 1][..])?;
    }
    geo_tags.write(&mut dir)?;
    dir.finish()?;

    Ok(())
}

/// GeoTIFF tag values for one raster.
#[derive(Debug, Clone, PartialEq)]
struct GeoTags {
    tiepoint: Option<[f64; 6]>,
    pixel_scale: Option<[f64; 3]>,
    transformation: Option<[f64; 16]>,
    key_directory: Vec<u16>,
    double_params: Option<Vec<f64>>,
    ascii_params: Option<String>,
}

impl GeoTags {
    /// Tags for `geo_transform` and `projection`.
    ///
    /// GeoKeys carried by `projection` are written back unchanged, except for
    /// `GTRasterTypeGeoKey` which always matches the corner based tiepoint
    /// written here. Otherwise the keys are derived from the description.
    fn new(geo_transform: &GeoTransform, projection: &Projection) -> Result<Self, IoError> {
        let gt = &geo_transform.0;
        let (tiepoint, pixel_scale, transformation) = if geo_transform.is_axis_aligned() {
            (
                Some([0.0, 0.0, 0.0, gt[0], gt[3], 0.0]),
                Some([gt[1], -gt[5], 0.0]),
                None,
            )
        } else {
            #[rustfmt::skip]
            let m = [
                gt[1], gt[2], 0.0, gt[0],
                gt[4], gt[5], 0.0, gt[3],
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            (None, None, Some(m))
        };

        if let Some(geo_keys) = projection.geo_keys() {
            let mut geo_keys = geo_keys.clone();
            geo_keys.set_short_value(GT_RASTER_TYPE_GEO_KEY, RASTER_PIXEL_IS_AREA);
            return Ok(Self {
                tiepoint,
                pixel_scale,
                transformation,
                key_directory: geo_keys.directory().to_vec(),
                double_params: Some(geo_keys.double_params().to_vec()).filter(|p| !p.is_empty()),
                ascii_params: Some(geo_keys.ascii_params().to_string()).filter(|a| !a.is_empty()),
            });
        }

        let mut keys: Vec<[u16; 4]> = Vec::new();
        match projection.model_kind() {
            Some(ModelKind::Projected) => {
                keys.push([GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_PROJECTED])
            }
            Some(ModelKind::Geographic) => {
                keys.push([GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC])
            }
            None => {}
        }
        keys.push([GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);

        let ascii_params = if projection.is_empty() {
            None
        } else {
            let citation = format!("{}|", projection.as_str());
            let count = u16::try_from(citation.len()).map_err(|_| {
                IoError::InvalidGeoTag(
                    "GeoAsciiParams",
                    format!("citation of {} bytes does not fit a GeoKey", citation.len()),
                )
            })?;
            keys.push([GT_CITATION_GEO_KEY, GEO_ASCII_PARAMS_TAG, count, 0]);
            Some(citation)
        };

        let mut key_directory = GEO_KEY_DIRECTORY_VERSION.to_vec();
        key_directory.push(keys.len() as u16);
        key_directory.extend(keys.iter().flatten());

        Ok(Self {
            tiepoint,
            pixel_scale,
            transformation,
            key_directory,
            double_params: None,
            ascii_params,
        })
    }

    fn write<W: Write + Seek>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>,
    ) -> Result<(), IoError> {
        if let Some(tiepoint) = &self.tiepoint {
            dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        }
        if let Some(scale) = &self.pixel_scale {
            dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        }
        if let Some(transformation) = &self.transformation {
            dir.write_tag(Tag::ModelTransformationTag, &transformation[..])?;
        }
        dir.write_tag(Tag::GeoKeyDirectoryTag, &self.key_directory[..])?;
        if let Some(doubles) = &self.double_params {
            dir.write_tag(Tag::GeoDoubleParamsTag, &doubles[..])?;
        }
        if let Some(ascii) = &self.ascii_params {
            dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
        }
        Ok(())
    }
}

/// Read size, georeferencing and band roles of a raster without decoding pixels.
///
/// TIFF files are inspected for GeoTIFF tags; other formats are treated as
/// not georeferenced and get [`GeoTransform::default`] and an empty projection.
pub fn read_raster_metadata(path: impl AsRef<Path>) -> Result<RasterMetadata, IoError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::FileDoesNotExist(path.to_path_buf()));
    }

    if crate::is_tiff_path(path) {
        let file = fs::File::open(path)?;
        return read_geotiff_metadata(BufReader::new(file));
    }

    let decoder = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let (width, height) = decoder.dimensions();
    let bands = match decoder.color_type().channel_count() {
        1 => vec![ColorInterpretation::Gray],
        2 => vec![ColorInterpretation::Gray, ColorInterpretation::Undefined],
        3 => rgb_bands(),
        _ => {
            let mut bands = rgb_bands();
            bands.push(ColorInterpretation::Undefined);
            bands
        }
    };

    Ok(RasterMetadata {
        size: ImageSize {
            width: width as usize,
            height: height as usize,
        },
        geo_transform: GeoTransform::default(),
        projection: Projection::default(),
        bands,
    })
}

fn rgb_bands() -> Vec<ColorInterpretation> {
    vec![
        ColorInterpretation::Red,
        ColorInterpretation::Green,
        ColorInterpretation::Blue,
    ]
}

fn read_geotiff_metadata<R: Read + Seek>(reader: R) -> Result<RasterMetadata, IoError> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;

    let bands = match TiffLayout::detect(&mut decoder) {
        Ok(layout) => layout.bands(),
        Err(IoError::UnsupportedRasterLayout(_))
        | Err(IoError::TiffDecodingError(tiff::TiffError::UnsupportedError(_))) => {
            vec![ColorInterpretation::Undefined]
        }
        Err(e) => return Err(e),
    };

    let geo_keys = match find_u16_vec(&mut decoder, Tag::GeoKeyDirectoryTag)? {
        Some(directory) if !directory.is_empty() => {
            let double_params =
                find_f64_vec(&mut decoder, Tag::GeoDoubleParamsTag)?.unwrap_or_default();
            let ascii_params = decoder
                .find_tag(Tag::GeoAsciiParamsTag)?
                .map(Value::into_string)
                .transpose()?
                .unwrap_or_default();
            Some(GeoKeyDirectory::new(directory, double_params, ascii_params)?)
        }
        _ => None,
    };
    let raster_type = geo_keys
        .as_ref()
        .and_then(|keys| keys.short_value(GT_RASTER_TYPE_GEO_KEY));

    let tiepoint = find_f64_vec(&mut decoder, Tag::ModelTiepointTag)?;
    let pixel_scale = find_f64_vec(&mut decoder, Tag::ModelPixelScaleTag)?;
    let transformation = find_f64_vec(&mut decoder, Tag::ModelTransformationTag)?;

    let mut geo_transform = match (transformation, tiepoint, pixel_scale) {
        (Some(m), _, _) => {
            if m.len() < 8 {
                return Err(IoError::InvalidGeoTag(
                    "ModelTransformation",
                    format!("expected 16 values, got {}", m.len()),
                ));
            }
            GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]])
        }
        (None, Some(tp), Some(scale)) => {
            if tp.len() < 6 || scale.len() < 2 {
                return Err(IoError::InvalidGeoTag(
                    "ModelTiepoint",
                    format!("{} tiepoint and {} scale values", tp.len(), scale.len()),
                ));
            }
            GeoTransform([
                tp[3] - tp[0] * scale[0],
                scale[0],
                0.0,
                tp[4] + tp[1] * scale[1],
                0.0,
                -scale[1],
            ])
        }
        _ => GeoTransform::default(),
    };

    if raster_type == Some(RASTER_PIXEL_IS_POINT) {
        // the tiepoint refers to the pixel center, move it to the corner
        let gt = &mut geo_transform.0;
        gt[0] -= 0.5 * gt[1] + 0.5 * gt[2];
        gt[3] -= 0.5 * gt[4] + 0.5 * gt[5];
    }

    Ok(RasterMetadata {
        size: ImageSize {
            width: width as usize,
            height: height as usize,
        },
        geo_transform,
        projection: geo_keys.map(Projection::from_geo_keys).unwrap_or_default(),
        bands,
    })
}

fn find_f64_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>, IoError> {
    Ok(decoder.find_tag(tag)?.map(Value::into_f64_vec).transpose()?)
}

fn find_u16_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<u16>>, IoError> {
    Ok(decoder.find_tag(tag)?.map(Value::into_u16_vec).transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gradient_band(size: ImageSize, offset: u8) -> Result<Image<u8, 1>, IoError> {
        let data = (0..size.area())
            .map(|i| (i as u8).wrapping_mul(7).wrapping_add(offset))
            .collect();
        Ok(Image::new(size, data)?)
    }

    fn smooth_band(size: ImageSize, offset: usize) -> Result<Image<u8, 1>, IoError> {
        let data = (0..size.height)
            .flat_map(|y| (0..size.width).map(move |x| (40 + x * 4 + y * 3 + offset) as u8))
            .collect();
        Ok(Image::new(size, data)?)
    }

    /// A GeoTIFF whose CRS is only an EPSG code, written without `GeoTiffDataset`.
    fn write_epsg_only_tiff(file_path: &Path, raster_type: u16) -> Result<Vec<u16>, IoError> {
        let keys = vec![
            1, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, raster_type, 3072, 0, 1, 25833,
        ];
        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buffer)?;
        let mut image = encoder.new_image::<colortype::Gray8>(2, 2)?;
        let dir = image.encoder();
        dir.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, 350_000.0, 6_000_000.0, 0.0][..])?;
        dir.write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..])?;
        dir.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
        image.write_data(&[1, 2, 3, 4])?;
        fs::write(file_path, buffer.into_inner())?;
        Ok(keys)
    }

    #[test]
    fn geotags_axis_aligned() -> Result<(), IoError> {
        let gt = GeoTransform::north_up(10.0, 20.0, 0.5, -0.25);
        let tags = GeoTags::new(&gt, &Projection::new("EPSG:25833"))?;

        assert_eq!(tags.tiepoint, Some([0.0, 0.0, 0.0, 10.0, 20.0, 0.0]));
        assert_eq!(tags.pixel_scale, Some([0.5, 0.25, 0.0]));
        assert_eq!(tags.transformation, None);
        assert_eq!(tags.ascii_params.as_deref(), Some("EPSG:25833|"));
        assert_eq!(
            tags.key_directory,
            vec![1, 1, 0, 2, 1025, 0, 1, 1, 1026, 34737, 11, 0]
        );
        Ok(())
    }

    #[test]
    fn geotags_citation_roundtrip() -> Result<(), IoError> {
        let tags = GeoTags::new(&GeoTransform::default(), &Projection::new("PROJCS[\"x\"]"))?;
        let keys = GeoKeyDirectory::new(
            tags.key_directory,
            vec![],
            tags.ascii_params.unwrap_or_default(),
        )?;
        assert_eq!(keys.short_value(GT_MODEL_TYPE_GEO_KEY), Some(MODEL_TYPE_PROJECTED));
        assert_eq!(keys.short_value(GT_RASTER_TYPE_GEO_KEY), Some(RASTER_PIXEL_IS_AREA));
        assert_eq!(keys.ascii_value(GT_CITATION_GEO_KEY), Some("PROJCS[\"x\"]"));
        Ok(())
    }

    #[test]
    fn geotags_carry_source_keys() -> Result<(), IoError> {
        let source = GeoKeyDirectory::new(
            vec![1, 1, 0, 3, 1025, 0, 1, 2, 2048, 0, 1, 4326, 2057, 34736, 1, 0],
            vec![6_378_137.0],
            "",
        )?;
        let tags = GeoTags::new(&GeoTransform::default(), &Projection::from_geo_keys(source))?;

        // raster type follows the corner based tiepoint, the rest is untouched
        assert_eq!(
            tags.key_directory,
            vec![1, 1, 0, 3, 1025, 0, 1, 1, 2048, 0, 1, 4326, 2057, 34736, 1, 0]
        );
        assert_eq!(tags.double_params, Some(vec![6_378_137.0]));
        assert_eq!(tags.ascii_params, None);
        Ok(())
    }

    #[test]
    fn geotags_reject_oversized_citation() {
        let projection = Projection::new("x".repeat(usize::from(u16::MAX) + 10));
        assert!(matches!(
            GeoTags::new(&GeoTransform::default(), &projection),
            Err(IoError::InvalidGeoTag("GeoAsciiParams", _))
        ));
    }

    #[test]
    fn horizontal_differencing_per_row() {
        let mut data = vec![10u8, 20, 5, 1, 1, 1];
        horizontal_differencing(&mut data, 3, 1);
        assert_eq!(data, vec![10, 10, 241, 1, 0, 0]);
    }

    #[test]
    fn write_read_gray_with_georeferencing() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("label.tif");

        let size = ImageSize {
            width: 5,
            height: 3,
        };
        let gt = GeoTransform::north_up(598_000.0, 6_640_000.0, 0.2, -0.2);
        let projection = Projection::new("PROJCS[\"ETRS89 / UTM zone 32N\"]");

        let mut dataset = GeoTiffDataset::create(&file_path, size, CreationOptions::gray())?;
        dataset.set_geo_transform(gt);
        dataset.set_projection(projection.clone());
        dataset.write_band(0, &gradient_band(size, 3)?)?;
        dataset.flush()?;

        let metadata = read_raster_metadata(&file_path)?;
        assert_eq!(metadata.size, size);
        assert_eq!(metadata.geo_transform, gt);
        assert_eq!(metadata.projection.as_str(), projection.as_str());
        assert_eq!(metadata.projection.model_kind(), Some(ModelKind::Projected));
        assert_eq!(metadata.bands, vec![ColorInterpretation::Gray]);

        let back = crate::functional::read_image_mono8(&file_path)?;
        assert_eq!(back.as_slice(), gradient_band(size, 3)?.as_slice());

        Ok(())
    }

    #[test]
    fn write_read_rgb_rotated_transform() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("image.tif");

        let size = ImageSize {
            width: 4,
            height: 4,
        };
        let gt = GeoTransform([100.0, 0.5, 0.1, 200.0, 0.1, -0.5]);

        let options = CreationOptions::rgb().with_compression(Compression::Deflate);
        let mut dataset = GeoTiffDataset::create(&file_path, size, options)?;
        dataset.set_geo_transform(gt);
        for band in 0..3 {
            dataset.write_band(band, &gradient_band(size, band as u8 * 50)?)?;
        }
        dataset.flush()?;

        let metadata = read_raster_metadata(&file_path)?;
        for (a, b) in metadata.geo_transform.0.iter().zip(gt.0.iter()) {
            assert_relative_eq!(a, b);
        }
        assert!(metadata.projection.is_empty());
        assert_eq!(metadata.bands, rgb_bands());

        let back = crate::functional::read_image_rgb8(&file_path)?;
        assert_eq!(back.get([0, 1, 2]), Some(&107));

        Ok(())
    }

    #[test]
    fn write_rgb_as_jpeg_ycbcr() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("ortho.tif");
        let size = ImageSize {
            width: 24,
            height: 20,
        };

        let mut dataset = GeoTiffDataset::create(&file_path, size, CreationOptions::rgb())?;
        dataset.set_geo_transform(GeoTransform::north_up(1.0, 2.0, 0.5, -0.5));
        dataset.set_projection(Projection::new("EPSG:25833"));
        let bands = (0..3)
            .map(|band| smooth_band(size, band * 30))
            .collect::<Result<Vec<_>, _>>()?;
        for (i, band) in bands.iter().enumerate() {
            dataset.write_band(i, band)?;
        }
        dataset.flush()?;

        let mut decoder = Decoder::new(BufReader::new(fs::File::open(&file_path)?))?;
        assert_eq!(
            decoder.find_tag_unsigned::<u16>(Tag::Compression)?,
            Some(COMPRESSION_JPEG)
        );
        assert_eq!(
            decoder.find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)?,
            Some(PHOTOMETRIC_YCBCR)
        );

        let back = crate::functional::read_image_rgb8(&file_path)?;
        assert_eq!(back.size(), size);
        for (i, band) in bands.iter().enumerate() {
            let decoded = back.channel(i)?;
            let error = decoded
                .as_slice()
                .iter()
                .zip(band.as_slice())
                .map(|(a, b)| (*a as f64 - *b as f64).abs())
                .sum::<f64>()
                / size.area() as f64;
            assert!(error < 4.0, "band {i} mean error {error}");
        }

        let metadata = read_raster_metadata(&file_path)?;
        assert_eq!(metadata.bands, rgb_bands());
        assert_eq!(metadata.projection.as_str(), "EPSG:25833");
        Ok(())
    }

    #[test]
    fn jpeg_rejects_predictor() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let size = ImageSize {
            width: 2,
            height: 2,
        };
        let options = CreationOptions {
            predictor: Predictor::Horizontal,
            ..CreationOptions::rgb()
        };
        assert!(matches!(
            GeoTiffDataset::create(tmp_dir.path().join("x.tif"), size, options),
            Err(IoError::UnsupportedRasterLayout(_))
        ));
        Ok(())
    }

    #[test]
    fn epsg_only_source_keeps_its_crs() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let source_path = tmp_dir.path().join("epsg.tif");
        let keys = write_epsg_only_tiff(&source_path, RASTER_PIXEL_IS_AREA)?;

        let source = read_raster_metadata(&source_path)?;
        assert_eq!(source.projection.as_str(), "EPSG:25833");
        assert_eq!(source.projection.epsg(), Some(25833));
        assert_eq!(
            source.geo_transform,
            GeoTransform::north_up(350_000.0, 6_000_000.0, 10.0, -10.0)
        );

        let copy_path = tmp_dir.path().join("copy.tif");
        let size = source.size;
        let mut dataset = GeoTiffDataset::create(&copy_path, size, CreationOptions::gray())?;
        dataset.set_geo_transform(source.geo_transform);
        dataset.set_projection(source.projection.clone());
        dataset.write_band(0, &gradient_band(size, 0)?)?;
        dataset.flush()?;

        let mut decoder = Decoder::new(BufReader::new(fs::File::open(&copy_path)?))?;
        assert_eq!(find_u16_vec(&mut decoder, Tag::GeoKeyDirectoryTag)?, Some(keys));

        let copy = read_raster_metadata(&copy_path)?;
        assert_eq!(copy.projection.epsg(), Some(25833));
        assert_eq!(copy.geo_transform, source.geo_transform);
        Ok(())
    }

    #[test]
    fn pixel_is_point_source_is_rewritten_as_area() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let source_path = tmp_dir.path().join("point.tif");
        write_epsg_only_tiff(&source_path, RASTER_PIXEL_IS_POINT)?;

        let source = read_raster_metadata(&source_path)?;
        assert_eq!(
            source.geo_transform,
            GeoTransform::north_up(349_995.0, 6_000_005.0, 10.0, -10.0)
        );

        let copy_path = tmp_dir.path().join("copy.tif");
        let mut dataset = GeoTiffDataset::create(&copy_path, source.size, CreationOptions::gray())?;
        dataset.set_geo_transform(source.geo_transform);
        dataset.set_projection(source.projection.clone());
        dataset.write_band(0, &gradient_band(source.size, 0)?)?;
        dataset.flush()?;

        let copy = read_raster_metadata(&copy_path)?;
        assert_eq!(copy.geo_transform, source.geo_transform);
        assert_eq!(
            copy.projection
                .geo_keys()
                .and_then(|keys| keys.short_value(GT_RASTER_TYPE_GEO_KEY)),
            Some(RASTER_PIXEL_IS_AREA)
        );
        Ok(())
    }

    #[test]
    fn flush_requires_every_band() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let size = ImageSize {
            width: 2,
            height: 2,
        };
        let mut dataset =
            GeoTiffDataset::create(tmp_dir.path().join("x.tif"), size, CreationOptions::rgb())?;
        dataset.write_band(0, &gradient_band(size, 0)?)?;

        assert!(matches!(dataset.flush(), Err(IoError::MissingBand(1, _))));
        Ok(())
    }

    #[test]
    fn write_band_checks_index_and_size() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let size = ImageSize {
            width: 2,
            height: 2,
        };
        let mut dataset =
            GeoTiffDataset::create(tmp_dir.path().join("x.tif"), size, CreationOptions::gray())?;

        let wrong = gradient_band(
            ImageSize {
                width: 3,
                height: 2,
            },
            0,
        )?;
        assert!(matches!(
            dataset.write_band(0, &wrong),
            Err(IoError::BandSizeMismatch(..))
        ));
        assert!(matches!(
            dataset.write_band(1, &gradient_band(size, 0)?),
            Err(IoError::BandIndexOutOfBounds(1, 1))
        ));
        Ok(())
    }

    #[test]
    fn missing_file() {
        let res = read_raster_metadata("/definitely/not/here.tif");
        assert!(matches!(res, Err(IoError::FileDoesNotExist(_))));
    }
}
