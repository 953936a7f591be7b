use geoaug_imgproc::{interpolation::InterpolationMode, warp::FillMode};

use crate::error::AugmentError;

/// A single random transform a stream may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Mirror left/right.
    HorizontalFlip,
    /// Mirror top/bottom.
    VerticalFlip,
    /// Rotate about the image center.
    Rotation,
    /// Translate along the x axis.
    WidthShift,
    /// Translate along the y axis.
    HeightShift,
    /// Add the same random intensity to every channel.
    ChannelShift,
    /// Multiply every value by a random factor.
    Brightness,
}

impl TransformKind {
    /// Whether the transform only moves pixels around.
    pub fn is_geometric(&self) -> bool {
        !matches!(self, TransformKind::ChannelShift | TransformKind::Brightness)
    }
}

/// Transforms that are safe on categorical rasters.
///
/// Anything not listed here would alter class values and is never applied to labels.
pub const LABEL_TRANSFORMS: [TransformKind; 5] = [
    TransformKind::HorizontalFlip,
    TransformKind::VerticalFlip,
    TransformKind::Rotation,
    TransformKind::WidthShift,
    TransformKind::HeightShift,
];

/// Parameters of the random transforms.
///
/// A range of `0.0` (or `None` for brightness) disables the transform.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentConfig {
    /// Randomly mirror left/right with probability 0.5.
    pub horizontal_flip: bool,
    /// Randomly mirror top/bottom with probability 0.5.
    pub vertical_flip: bool,
    /// Rotation angle is drawn from `[-rotation_range, rotation_range]` degrees.
    pub rotation_range: f32,
    /// Horizontal shift drawn from `[-r, r]` as a fraction of the width.
    pub width_shift_range: f32,
    /// Vertical shift drawn from `[-r, r]` as a fraction of the height.
    pub height_shift_range: f32,
    /// Brightness factor drawn from `[low, high]`.
    pub brightness_range: Option<(f32, f32)>,
    /// Channel shift intensity drawn from `[-r, r]`.
    pub channel_shift_range: f32,
    /// Fill of pixels moved in from outside the image by rotation or shift.
    pub fill_mode: FillMode,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            horizontal_flip: true,
            vertical_flip: true,
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            brightness_range: Some((0.5, 2.0)),
            channel_shift_range: 0.0,
            fill_mode: FillMode::Constant(120.0),
        }
    }
}

impl AugmentConfig {
    /// Set the flips.
    pub fn with_flips(mut self, horizontal: bool, vertical: bool) -> Self {
        self.horizontal_flip = horizontal;
        self.vertical_flip = vertical;
        self
    }

    /// Set the rotation range in degrees.
    pub fn with_rotation_range(mut self, degrees: f32) -> Self {
        self.rotation_range = degrees;
        self
    }

    /// Set the shift ranges as fractions of width and height.
    pub fn with_shift_range(mut self, width: f32, height: f32) -> Self {
        self.width_shift_range = width;
        self.height_shift_range = height;
        self
    }

    /// Set or disable the brightness range.
    pub fn with_brightness_range(mut self, range: Option<(f32, f32)>) -> Self {
        self.brightness_range = range;
        self
    }

    /// Set the channel shift range.
    pub fn with_channel_shift_range(mut self, range: f32) -> Self {
        self.channel_shift_range = range;
        self
    }

    /// Set the fill mode used by rotation and shift on images.
    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Check that every range can be sampled.
    pub fn validate(&self) -> Result<(), AugmentError> {
        let non_negative = [
            ("rotation_range", self.rotation_range),
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
            ("channel_shift_range", self.channel_shift_range),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(AugmentError::InvalidConfig(format!(
                    "{name} must be a non negative number, got {value}"
                )));
            }
        }

        for (name, value) in [
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
        ] {
            if value >= 1.0 {
                return Err(AugmentError::InvalidConfig(format!(
                    "{name} is a fraction of the image size and must be < 1, got {value}"
                )));
            }
        }

        if let Some((low, high)) = self.brightness_range {
            if !(low.is_finite() && high.is_finite() && 0.0 <= low && low <= high) {
                return Err(AugmentError::InvalidConfig(format!(
                    "brightness_range must satisfy 0 <= low <= high, got ({low}, {high})"
                )));
            }
        }

        if let FillMode::Constant(value) = self.fill_mode {
            if !value.is_finite() {
                return Err(AugmentError::InvalidConfig(format!(
                    "fill value must be finite, got {value}"
                )));
            }
        }

        Ok(())
    }

    /// Transforms enabled by this configuration.
    pub fn enabled(&self) -> Vec<TransformKind> {
        let candidates = [
            (TransformKind::HorizontalFlip, self.horizontal_flip),
            (TransformKind::VerticalFlip, self.vertical_flip),
            (TransformKind::Rotation, self.rotation_range > 0.0),
            (TransformKind::WidthShift, self.width_shift_range > 0.0),
            (TransformKind::HeightShift, self.height_shift_range > 0.0),
            (TransformKind::ChannelShift, self.channel_shift_range > 0.0),
            (TransformKind::Brightness, self.brightness_range.is_some()),
        ];
        candidates
            .into_iter()
            .filter_map(|(kind, on)| on.then_some(kind))
            .collect()
    }

    /// The view used for images: every enabled transform.
    pub fn image_view(&self) -> TransformView {
        TransformView {
            kinds: self.enabled(),
            fill_mode: self.fill_mode,
            interpolation: InterpolationMode::Bilinear,
        }
    }

    /// The view used for labels: enabled transforms from [`LABEL_TRANSFORMS`] only.
    ///
    /// Labels replicate border pixels and use nearest interpolation so no new
    /// class value can appear.
    pub fn label_view(&self) -> TransformView {
        TransformView {
            kinds: self
                .enabled()
                .into_iter()
                .filter(|kind| LABEL_TRANSFORMS.contains(kind))
                .collect(),
            fill_mode: FillMode::Nearest,
            interpolation: InterpolationMode::Nearest,
        }
    }
}

/// The subset of transforms one stream applies, and how it resamples.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformView {
    kinds: Vec<TransformKind>,
    fill_mode: FillMode,
    interpolation: InterpolationMode,
}

impl TransformView {
    /// Whether the view applies `kind`.
    pub fn allows(&self, kind: TransformKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// The transforms of the view.
    pub fn kinds(&self) -> &[TransformKind] {
        &self.kinds
    }

    /// Fill of pixels moved in from outside the image.
    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    /// Interpolation used by rotation and shift.
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_views() {
        let config = AugmentConfig::default();
        assert_eq!(
            config.image_view().kinds(),
            &[
                TransformKind::HorizontalFlip,
                TransformKind::VerticalFlip,
                TransformKind::Brightness
            ]
        );
        assert_eq!(
            config.label_view().kinds(),
            &[TransformKind::HorizontalFlip, TransformKind::VerticalFlip]
        );
        assert_eq!(config.image_view().fill_mode(), FillMode::Constant(120.0));
        assert_eq!(config.label_view().fill_mode(), FillMode::Nearest);
    }

    #[test]
    fn label_view_never_photometric() {
        let config = AugmentConfig::default()
            .with_rotation_range(30.0)
            .with_shift_range(0.1, 0.2)
            .with_channel_shift_range(20.0);
        let label = config.label_view();
        assert!(label.kinds().iter().all(TransformKind::is_geometric));
        assert!(label.allows(TransformKind::Rotation));
        assert!(label.allows(TransformKind::HeightShift));
        assert!(!label.allows(TransformKind::ChannelShift));
        assert!(config.image_view().allows(TransformKind::ChannelShift));
        assert_eq!(label.interpolation(), InterpolationMode::Nearest);
    }

    #[test]
    fn validate_ranges() {
        assert!(AugmentConfig::default().validate().is_ok());
        assert!(AugmentConfig::default()
            .with_rotation_range(-1.0)
            .validate()
            .is_err());
        assert!(AugmentConfig::default()
            .with_shift_range(1.0, 0.0)
            .validate()
            .is_err());
        assert!(AugmentConfig::default()
            .with_brightness_range(Some((2.0, 0.5)))
            .validate()
            .is_err());
        assert!(AugmentConfig::default()
            .with_fill_mode(FillMode::Constant(f32::NAN))
            .validate()
            .is_err());
    }
}
