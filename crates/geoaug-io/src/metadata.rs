use geoaug_image::ImageSize;

use crate::error::IoError;

/// Affine mapping from pixel/line coordinates to georeferenced coordinates.
///
/// The six coefficients follow the GDAL convention:
///
/// ```text
/// x_geo = gt[0] + col * gt[1] + row * gt[2]
/// y_geo = gt[3] + col * gt[4] + row * gt[5]
/// ```
///
/// so `gt[0], gt[3]` is the upper left corner of the upper left pixel, `gt[1]`
/// the pixel width and `gt[5]` the (usually negative) pixel height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl Default for GeoTransform {
    /// The transform GDAL reports for rasters without georeferencing.
    fn default() -> Self {
        GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

impl GeoTransform {
    /// Build a north-up transform from its origin and pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    /// True when the transform has no rotation or shear terms.
    pub fn is_axis_aligned(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    /// Map a pixel/line position to georeferenced coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.0;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }
}

// GeoKey ids and values, see the OGC GeoTIFF standard, annex B.
pub(crate) const GEO_KEY_DIRECTORY_VERSION: [u16; 3] = [1, 1, 0];
pub(crate) const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
pub(crate) const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
pub(crate) const GT_CITATION_GEO_KEY: u16 = 1026;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const GEOG_CITATION_GEO_KEY: u16 = 2049;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const PCS_CITATION_GEO_KEY: u16 = 3073;
pub(crate) const MODEL_TYPE_PROJECTED: u16 = 1;
pub(crate) const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
pub(crate) const RASTER_PIXEL_IS_AREA: u16 = 1;
pub(crate) const RASTER_PIXEL_IS_POINT: u16 = 2;
pub(crate) const GEO_ASCII_PARAMS_TAG: u16 = 34737;
const USER_DEFINED: u16 = 32767;

/// The GeoKey directory of a GeoTIFF together with the parameter tags its
/// keys point into.
///
/// Kept verbatim so a CRS described only by keys (an EPSG code, datum or unit
/// keys) survives a read/write cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoKeyDirectory {
    directory: Vec<u16>,
    double_params: Vec<f64>,
    ascii_params: String,
}

impl GeoKeyDirectory {
    /// Wrap the values of `GeoKeyDirectoryTag`, `GeoDoubleParamsTag` and
    /// `GeoAsciiParamsTag`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidGeoTag`] if the header is truncated or the
    /// directory holds fewer keys than it declares.
    pub fn new(
        directory: Vec<u16>,
        double_params: Vec<f64>,
        ascii_params: impl Into<String>,
    ) -> Result<Self, IoError> {
        if directory.len() < 4 {
            return Err(IoError::InvalidGeoTag(
                "GeoKeyDirectory",
                format!("header has {} values", directory.len()),
            ));
        }

        let declared = directory[3] as usize;
        let held = (directory.len() - 4) / 4;
        if held < declared {
            return Err(IoError::InvalidGeoTag(
                "GeoKeyDirectory",
                format!("declares {declared} keys, holds {held}"),
            ));
        }

        Ok(Self {
            directory,
            double_params,
            ascii_params: ascii_params.into(),
        })
    }

    /// Raw `GeoKeyDirectoryTag` values.
    pub fn directory(&self) -> &[u16] {
        &self.directory
    }

    /// Raw `GeoDoubleParamsTag` values.
    pub fn double_params(&self) -> &[f64] {
        &self.double_params
    }

    /// Raw `GeoAsciiParamsTag` text.
    pub fn ascii_params(&self) -> &str {
        &self.ascii_params
    }

    /// The declared `[id, location, count, value]` entries.
    pub fn entries(&self) -> impl Iterator<Item = [u16; 4]> + '_ {
        let declared = self.directory.get(3).copied().unwrap_or(0) as usize;
        self.directory
            .get(4..)
            .unwrap_or_default()
            .chunks_exact(4)
            .take(declared)
            .map(|e| [e[0], e[1], e[2], e[3]])
    }

    /// Value of a SHORT key stored inline in the directory.
    pub fn short_value(&self, id: u16) -> Option<u16> {
        self.entries()
            .find(|e| e[0] == id && e[1] == 0)
            .map(|e| e[3])
    }

    /// Text of an ASCII key, without the `|` terminator.
    pub fn ascii_value(&self, id: u16) -> Option<&str> {
        let entry = self
            .entries()
            .find(|e| e[0] == id && e[1] == GEO_ASCII_PARAMS_TAG)?;
        let (count, start) = (entry[2] as usize, entry[3] as usize);
        let value = self
            .ascii_params
            .get(start..start + count)
            .or_else(|| self.ascii_params.get(start..))?;
        Some(value.trim_end_matches(['|', '\0']))
    }

    /// EPSG code of the projected or, failing that, geographic CRS.
    pub fn epsg(&self) -> Option<u16> {
        [PROJECTED_CS_TYPE_GEO_KEY, GEOGRAPHIC_TYPE_GEO_KEY]
            .into_iter()
            .filter_map(|id| self.short_value(id))
            .find(|&code| code != 0 && code != USER_DEFINED)
    }

    /// Whether any key beyond the raster type describes the CRS.
    pub fn has_crs(&self) -> bool {
        self.entries().any(|e| e[0] != GT_RASTER_TYPE_GEO_KEY)
    }

    /// Set a SHORT key, inserting it in id order when missing.
    pub(crate) fn set_short_value(&mut self, id: u16, value: u16) {
        if self.short_value(id) == Some(value) {
            return;
        }

        let mut entries: Vec<[u16; 4]> = self.entries().filter(|e| e[0] != id).collect();
        entries.push([id, 0, 1, value]);
        entries.sort_by_key(|e| e[0]);

        let mut directory = self
            .directory
            .get(..3)
            .map_or(GEO_KEY_DIRECTORY_VERSION.to_vec(), <[u16]>::to_vec);
        directory.push(entries.len() as u16);
        directory.extend(entries.iter().flatten());
        self.directory = directory;
    }
}

/// Description of the coordinate reference system of a raster.
///
/// A projection set by hand is a free text description, usually WKT or an
/// authority code such as `EPSG:25833`. A projection read from a GeoTIFF also
/// keeps the [`GeoKeyDirectory`] it came from, which is written back as is.
/// Empty when the raster carries no CRS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    description: String,
    geo_keys: Option<GeoKeyDirectory>,
}

impl Projection {
    /// Create a projection from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Projection {
            description: value.into(),
            geo_keys: None,
        }
    }

    /// Create a projection from the GeoKeys of a GeoTIFF.
    ///
    /// The description is the first citation found, or `EPSG:<code>` when
    /// the keys only carry a code.
    pub fn from_geo_keys(geo_keys: GeoKeyDirectory) -> Self {
        let description = [
            GT_CITATION_GEO_KEY,
            PCS_CITATION_GEO_KEY,
            GEOG_CITATION_GEO_KEY,
        ]
        .into_iter()
        .filter_map(|id| geo_keys.ascii_value(id))
        .find(|citation| !citation.is_empty())
        .map(str::to_string)
        .or_else(|| geo_keys.epsg().map(|code| format!("EPSG:{code}")))
        .unwrap_or_default();

        Projection {
            description,
            geo_keys: Some(geo_keys),
        }
    }

    /// The CRS description.
    pub fn as_str(&self) -> &str {
        &self.description
    }

    /// The GeoKeys this projection was read from.
    pub fn geo_keys(&self) -> Option<&GeoKeyDirectory> {
        self.geo_keys.as_ref()
    }

    /// EPSG code from the GeoKeys or from an `EPSG:<code>` description.
    pub fn epsg(&self) -> Option<u16> {
        self.geo_keys
            .as_ref()
            .and_then(GeoKeyDirectory::epsg)
            .or_else(|| {
                let code = self.description.trim();
                code.get(..5)
                    .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
                    .and_then(|_| code[5..].parse().ok())
            })
    }

    /// Whether a CRS is set.
    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && !self.geo_keys.as_ref().is_some_and(GeoKeyDirectory::has_crs)
    }

    /// Whether the CRS is projected or geographic, from `GTModelTypeGeoKey`
    /// or else from the WKT head.
    pub fn model_kind(&self) -> Option<ModelKind> {
        match self
            .geo_keys
            .as_ref()
            .and_then(|keys| keys.short_value(GT_MODEL_TYPE_GEO_KEY))
        {
            Some(MODEL_TYPE_PROJECTED) => return Some(ModelKind::Projected),
            Some(MODEL_TYPE_GEOGRAPHIC) => return Some(ModelKind::Geographic),
            _ => {}
        }

        let head = self.description.trim_start().to_ascii_uppercase();
        if head.starts_with("PROJCS") || head.starts_with("PROJCRS") {
            Some(ModelKind::Projected)
        } else if head.starts_with("GEOGCS") || head.starts_with("GEOGCRS") {
            Some(ModelKind::Geographic)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}

/// Coarse kind of coordinate system, as stored in `GTModelTypeGeoKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Projected coordinate system.
    Projected,
    /// Geographic (lat/lon) coordinate system.
    Geographic,
}

/// Semantic role of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorInterpretation {
    /// Grayscale or categorical values.
    Gray,
    /// Red channel.
    Red,
    /// Green channel.
    Green,
    /// Blue channel.
    Blue,
    /// Index into a color table.
    Palette,
    /// Role unknown.
    Undefined,
}

/// Spatial metadata of a raster: size, georeferencing and band roles.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    /// Raster dimensions (columns x rows).
    pub size: ImageSize,
    /// Pixel to world mapping.
    pub geo_transform: GeoTransform,
    /// Coordinate reference system.
    pub projection: Projection,
    /// Role of every band, in band order.
    pub bands: Vec<ColorInterpretation>,
}

impl RasterMetadata {
    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.size.height
    }
}
