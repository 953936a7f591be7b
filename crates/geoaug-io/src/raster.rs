use std::{
    fs,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use geoaug_image::{Image, ImageSize};
use tiff::{
    decoder::{Decoder, DecodingResult},
    tags::Tag,
};

use crate::error::IoError;
use crate::metadata::ColorInterpretation;

const PHOTOMETRIC_PALETTE: u16 = 3;
const PREDICTOR_HORIZONTAL: u16 = 2;

const COMPRESSION_NONE: u16 = 1;
const COMPRESSION_LZW: u16 = 5;
const COMPRESSION_JPEG: u16 = 7;
const COMPRESSION_DEFLATE: u16 = 8;
const COMPRESSION_PACKBITS: u16 = 32773;
const COMPRESSION_ADOBE_DEFLATE: u16 = 32946;

/// Sample layout of an 8-bit TIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TiffLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    /// One index per pixel into a `ColorMap`.
    Palette,
}

impl TiffLayout {
    /// Inspect the first directory of `decoder`.
    ///
    /// JPEG compressed YCbCr rasters are converted to RGB by the decoder and
    /// report [`TiffLayout::Rgb`].
    pub(crate) fn detect<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Self, IoError> {
        let photometric = decoder.find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)?;
        if photometric == Some(PHOTOMETRIC_PALETTE) {
            return Ok(TiffLayout::Palette);
        }

        match decoder.colortype()? {
            tiff::ColorType::Gray(_) => Ok(TiffLayout::Gray),
            tiff::ColorType::GrayA(_) => Ok(TiffLayout::GrayAlpha),
            tiff::ColorType::RGB(_) => Ok(TiffLayout::Rgb),
            tiff::ColorType::RGBA(_) => Ok(TiffLayout::Rgba),
            tiff::ColorType::YCbCr(_) => {
                match decoder.find_tag_unsigned::<u16>(Tag::Compression)? {
                    Some(COMPRESSION_JPEG) => Ok(TiffLayout::Rgb),
                    other => Err(IoError::UnsupportedRasterLayout(format!(
                        "YCbCr samples with compression {other:?}"
                    ))),
                }
            }
            other => Err(IoError::UnsupportedRasterLayout(format!("{other:?}"))),
        }
    }

    /// Interleaved samples per pixel once decoded.
    pub(crate) fn channels(self) -> usize {
        match self {
            TiffLayout::Gray | TiffLayout::Palette => 1,
            TiffLayout::GrayAlpha => 2,
            TiffLayout::Rgb => 3,
            TiffLayout::Rgba => 4,
        }
    }

    pub(crate) fn bands(self) -> Vec<ColorInterpretation> {
        use ColorInterpretation::*;
        match self {
            TiffLayout::Gray => vec![Gray],
            TiffLayout::GrayAlpha => vec![Gray, Undefined],
            TiffLayout::Rgb => vec![Red, Green, Blue],
            TiffLayout::Rgba => vec![Red, Green, Blue, Undefined],
            TiffLayout::Palette => vec![Palette],
        }
    }
}

/// A decoded 8-bit TIFF with its samples still interleaved.
#[derive(Debug)]
pub(crate) struct TiffRaster {
    pub size: ImageSize,
    pub layout: TiffLayout,
    pub data: Vec<u8>,
    /// RGB entries of a palette raster.
    pub color_map: Vec<[u8; 3]>,
}

impl TiffRaster {
    pub(crate) fn read(file_path: &Path) -> Result<Self, IoError> {
        let file = fs::File::open(file_path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        let size = ImageSize {
            width: width as usize,
            height: height as usize,
        };

        let layout = TiffLayout::detect(&mut decoder).map_err(|e| match e {
            IoError::UnsupportedRasterLayout(what) => {
                IoError::UnsupportedRasterLayout(format!("{what} in {}", file_path.display()))
            }
            e => e,
        })?;

        if layout == TiffLayout::Palette {
            let data = read_palette_indices(&mut decoder, file_path, size)?;
            let color_map = read_color_map(&mut decoder)?;
            return Ok(Self {
                size,
                layout,
                data,
                color_map,
            });
        }

        let data = match decoder.read_image()? {
            DecodingResult::U8(data) => data,
            _ => {
                return Err(IoError::UnsupportedRasterLayout(format!(
                    "non 8-bit samples in {}",
                    file_path.display()
                )))
            }
        };

        Ok(Self {
            size,
            layout,
            data,
            color_map: Vec::new(),
        })
    }

    /// Three band image; gray is replicated, palette indices are looked up
    /// and alpha is dropped.
    pub(crate) fn into_rgb8(self) -> Result<Image<u8, 3>, IoError> {
        let rgb = match self.layout {
            TiffLayout::Gray => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            TiffLayout::GrayAlpha => self
                .data
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0]])
                .collect(),
            TiffLayout::Rgb => self.data,
            TiffLayout::Rgba => self
                .data
                .chunks_exact(4)
                .flat_map(|p| [p[0], p[1], p[2]])
                .collect(),
            TiffLayout::Palette => self
                .data
                .iter()
                .flat_map(|&i| self.color_map.get(i as usize).copied().unwrap_or_default())
                .collect(),
        };
        Ok(Image::new(self.size, rgb)?)
    }

    /// First band; palette rasters keep their indices.
    pub(crate) fn into_mono8(self) -> Result<Image<u8, 1>, IoError> {
        let band = self
            .data
            .into_iter()
            .step_by(self.layout.channels())
            .collect();
        Ok(Image::new(self.size, band)?)
    }
}

fn read_palette_indices<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    file_path: &Path,
    size: ImageSize,
) -> Result<Vec<u8>, IoError> {
    let bits = decoder
        .find_tag_unsigned_vec::<u16>(Tag::BitsPerSample)?
        .unwrap_or_else(|| vec![1]);
    if bits != [8] {
        return Err(IoError::UnsupportedRasterLayout(format!(
            "palette with {bits:?} bits per sample in {}",
            file_path.display()
        )));
    }
    if decoder.find_tag(Tag::TileWidth)?.is_some() {
        return Err(IoError::UnsupportedRasterLayout(format!(
            "tiled palette raster {}",
            file_path.display()
        )));
    }

    let compression = decoder
        .find_tag_unsigned::<u16>(Tag::Compression)?
        .unwrap_or(COMPRESSION_NONE);
    let predictor = decoder.find_tag_unsigned::<u16>(Tag::Predictor)?;
    let rows_per_strip = decoder
        .find_tag_unsigned::<u64>(Tag::RowsPerStrip)?
        .map_or(size.height, |rows| rows.min(size.height as u64) as usize)
        .max(1);
    let offsets = decoder
        .find_tag_unsigned_vec::<u64>(Tag::StripOffsets)?
        .unwrap_or_default();
    let counts = decoder
        .find_tag_unsigned_vec::<u64>(Tag::StripByteCounts)?
        .unwrap_or_default();

    let strips = size.height.div_ceil(rows_per_strip);
    if offsets.len() < strips || counts.len() < strips {
        return Err(IoError::UnsupportedRasterLayout(format!(
            "{} strip offsets for {strips} strips in {}",
            offsets.len().min(counts.len()),
            file_path.display()
        )));
    }

    let mut file = fs::File::open(file_path)?;
    let mut data = Vec::with_capacity(size.area());
    for (strip, (&offset, &count)) in offsets.iter().zip(&counts).take(strips).enumerate() {
        let rows = rows_per_strip.min(size.height - strip * rows_per_strip);
        let expected = rows * size.width;

        file.seek(SeekFrom::Start(offset))?;
        let mut raw = Vec::new();
        (&mut file).take(count).read_to_end(&mut raw)?;

        let mut samples = decompress(compression, &raw, expected)
            .map_err(|e| IoError::CorruptStrip(strip, e))?;
        if samples.len() < expected {
            return Err(IoError::CorruptStrip(
                strip,
                format!("{} of {expected} samples", samples.len()),
            ));
        }
        samples.truncate(expected);

        if predictor == Some(PREDICTOR_HORIZONTAL) {
            for row in samples.chunks_exact_mut(size.width) {
                for i in 1..row.len() {
                    row[i] = row[i].wrapping_add(row[i - 1]);
                }
            }
        }
        data.extend_from_slice(&samples);
    }

    Ok(data)
}

fn decompress(compression: u16, raw: &[u8], expected: usize) -> Result<Vec<u8>, String> {
    match compression {
        COMPRESSION_NONE => Ok(raw.to_vec()),
        COMPRESSION_LZW => weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .decode(raw)
            .map_err(|e| e.to_string()),
        COMPRESSION_DEFLATE | COMPRESSION_ADOBE_DEFLATE => {
            let mut out = Vec::with_capacity(expected);
            flate2::read::ZlibDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|e| e.to_string())?;
            Ok(out)
        }
        COMPRESSION_PACKBITS => Ok(unpack_bits(raw, expected)),
        other => Err(format!("compression {other} is not supported for palettes")),
    }
}

fn unpack_bits(raw: &[u8], expected: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;
    while i < raw.len() && out.len() < expected {
        let header = raw[i] as i8;
        i += 1;
        match header {
            -128 => {}
            0.. => {
                let end = (i + header as usize + 1).min(raw.len());
                out.extend_from_slice(&raw[i..end]);
                i = end;
            }
            _ => {
                if let Some(&value) = raw.get(i) {
                    let run = 1 + header.unsigned_abs() as usize;
                    out.extend(std::iter::repeat(value).take(run));
                }
                i += 1;
            }
        }
    }
    out
}

/// 16-bit `ColorMap` entries scaled to 8 bits.
fn read_color_map<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<[u8; 3]>, IoError> {
    let map = decoder
        .find_tag_unsigned_vec::<u16>(Tag::ColorMap)?
        .ok_or_else(|| IoError::UnsupportedRasterLayout("palette without ColorMap".into()))?;
    if map.len() % 3 != 0 {
        return Err(IoError::UnsupportedRasterLayout(format!(
            "ColorMap with {} values",
            map.len()
        )));
    }

    let n = map.len() / 3;
    Ok((0..n)
        .map(|i| {
            [
                (map[i] >> 8) as u8,
                (map[n + i] >> 8) as u8,
                (map[2 * n + i] >> 8) as u8,
            ]
        })
        .collect())
}
