use geoaug_image::{Image, ImageError};
use geoaug_imgproc::{enhance, flip, warp};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::{AugmentConfig, TransformKind, TransformView};

/// Random parameters drawn for one augmented sample.
///
/// Shifts are fractions of the image width and height so that the same draw
/// maps to the same relative displacement on image and label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    /// Rotation angle in degrees.
    pub rotation: f32,
    /// Horizontal shift as a fraction of the width.
    pub shift_x: f32,
    /// Vertical shift as a fraction of the height.
    pub shift_y: f32,
    /// Mirror left/right.
    pub flip_horizontal: bool,
    /// Mirror top/bottom.
    pub flip_vertical: bool,
    /// Intensity added to every channel.
    pub channel_shift: f32,
    /// Brightness multiplier.
    pub brightness: f32,
}

impl Default for TransformParams {
    /// The identity transform.
    fn default() -> Self {
        Self {
            rotation: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            channel_shift: 0.0,
            brightness: 1.0,
        }
    }
}

impl TransformParams {
    /// Whether both parameter sets move pixels identically.
    pub fn same_geometry(&self, other: &TransformParams) -> bool {
        self.rotation == other.rotation
            && self.shift_x == other.shift_x
            && self.shift_y == other.shift_y
            && self.flip_horizontal == other.flip_horizontal
            && self.flip_vertical == other.flip_vertical
    }

    fn has_affine(&self) -> bool {
        self.rotation != 0.0 || self.shift_x != 0.0 || self.shift_y != 0.0
    }

    /// Apply the parameters to an 8-bit raster.
    ///
    /// Rotation and shift go first, then the flips, then the channel shift and
    /// the brightness. Resampling uses the interpolation and fill of `view`.
    pub fn apply<const C: usize>(
        &self,
        src: &Image<u8, C>,
        view: &TransformView,
    ) -> Result<Image<u8, C>, ImageError> {
        let mut dst = if self.has_affine() {
            self.warp(src, view)?
        } else {
            src.clone()
        };

        if self.flip_horizontal {
            dst = flip::horizontal_flip(&dst)?;
        }
        if self.flip_vertical {
            dst = flip::vertical_flip(&dst)?;
        }
        if self.channel_shift != 0.0 {
            dst = enhance::channel_shift(&dst, self.channel_shift)?;
        }
        if self.brightness != 1.0 {
            dst = enhance::adjust_brightness(&dst, self.brightness)?;
        }

        Ok(dst)
    }

    fn warp<const C: usize>(
        &self,
        src: &Image<u8, C>,
        view: &TransformView,
    ) -> Result<Image<u8, C>, ImageError> {
        let src_f32 = src.cast::<f32>()?;
        let mut dst_f32 = Image::<f32, C>::from_size_val(src.size(), 0.0)?;

        let center = (
            (src.cols() as f32 - 1.0) / 2.0,
            (src.rows() as f32 - 1.0) / 2.0,
        );
        let m = warp::get_rotation_shift_matrix2d(
            center,
            self.rotation,
            self.shift_x * src.cols() as f32,
            self.shift_y * src.rows() as f32,
        );

        warp::warp_affine(
            &src_f32,
            &mut dst_f32,
            &m,
            view.interpolation(),
            view.fill_mode(),
        )?;

        let data = dst_f32
            .into_vec()
            .into_iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        Image::new(src.size(), data)
    }
}

/// Endless, seeded sequence of [`TransformParams`].
///
/// Every step consumes the same number of random values whatever the view,
/// so two streams built from the same seed and configuration stay in lockstep
/// and only differ in which transforms they keep.
pub struct TransformStream {
    rng: StdRng,
    config: AugmentConfig,
    view: TransformView,
}

impl TransformStream {
    /// Create a stream for `view` of `config`, seeded with `seed`.
    pub fn new(seed: u64, config: &AugmentConfig, view: TransformView) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config: config.clone(),
            view,
        }
    }

    fn uniform(&mut self, low: f32, high: f32) -> f32 {
        low + self.rng.random::<f32>() * (high - low)
    }
}

impl Iterator for TransformStream {
    type Item = TransformParams;

    fn next(&mut self) -> Option<Self::Item> {
        let config = &self.config;
        let (rotation_range, width_range, height_range, shift_range) = (
            config.rotation_range,
            config.width_shift_range,
            config.height_shift_range,
            config.channel_shift_range,
        );
        let (bright_low, bright_high) = config.brightness_range.unwrap_or((1.0, 1.0));

        // fixed draw order, one value per transform
        let rotation = self.uniform(-rotation_range, rotation_range);
        let shift_x = self.uniform(-width_range, width_range);
        let shift_y = self.uniform(-height_range, height_range);
        let flip_horizontal = self.rng.random::<f32>() < 0.5;
        let flip_vertical = self.rng.random::<f32>() < 0.5;
        let channel_shift = self.uniform(-shift_range, shift_range);
        let brightness = self.uniform(bright_low, bright_high);

        let view = &self.view;
        let identity = TransformParams::default();
        Some(TransformParams {
            rotation: if view.allows(TransformKind::Rotation) {
                rotation
            } else {
                identity.rotation
            },
            shift_x: if view.allows(TransformKind::WidthShift) {
                shift_x
            } else {
                identity.shift_x
            },
            shift_y: if view.allows(TransformKind::HeightShift) {
                shift_y
            } else {
                identity.shift_y
            },
            flip_horizontal: view.allows(TransformKind::HorizontalFlip) && flip_horizontal,
            flip_vertical: view.allows(TransformKind::VerticalFlip) && flip_vertical,
            channel_shift: if view.allows(TransformKind::ChannelShift) {
                channel_shift
            } else {
                identity.channel_shift
            },
            brightness: if view.allows(TransformKind::Brightness) {
                brightness
            } else {
                identity.brightness
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use geoaug_image::{Image, ImageError, ImageSize};
    use geoaug_imgproc::warp::FillMode;

    use super::{TransformParams, TransformStream};
    use crate::config::AugmentConfig;

    #[test]
    fn streams_stay_in_lockstep() {
        let config = AugmentConfig::default()
            .with_rotation_range(20.0)
            .with_shift_range(0.1, 0.1)
            .with_channel_shift_range(30.0);

        let images = TransformStream::new(17, &config, config.image_view());
        let labels = TransformStream::new(17, &config, config.label_view());

        for (image, label) in images.zip(labels).take(32) {
            assert!(image.same_geometry(&label));
            assert_eq!(label.channel_shift, 0.0);
            assert_eq!(label.brightness, 1.0);
        }
    }

    #[test]
    fn same_seed_same_params() {
        let config = AugmentConfig::default();
        let a: Vec<_> = TransformStream::new(3, &config, config.image_view())
            .take(8)
            .collect();
        let b: Vec<_> = TransformStream::new(3, &config, config.image_view())
            .take(8)
            .collect();
        let c: Vec<_> = TransformStream::new(4, &config, config.image_view())
            .take(8)
            .collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn params_within_ranges() {
        let config = AugmentConfig::default()
            .with_rotation_range(10.0)
            .with_shift_range(0.2, 0.3);
        for p in TransformStream::new(5, &config, config.image_view()).take(64) {
            assert!((-10.0..=10.0).contains(&p.rotation));
            assert!((-0.2..=0.2).contains(&p.shift_x));
            assert!((-0.3..=0.3).contains(&p.shift_y));
            assert!((0.5..=2.0).contains(&p.brightness));
        }
    }

    #[test]
    fn apply_flips_only() -> Result<(), ImageError> {
        let config = AugmentConfig::default();
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![1, 2, 3, 4],
        )?;

        let params = TransformParams {
            flip_horizontal: true,
            flip_vertical: true,
            ..Default::default()
        };
        let out = params.apply(&image, &config.label_view())?;
        assert_eq!(out.as_slice(), &[4, 3, 2, 1]);

        let identity = TransformParams::default().apply(&image, &config.image_view())?;
        assert_eq!(identity, image);
        Ok(())
    }

    #[test]
    fn apply_shift_fills() -> Result<(), ImageError> {
        let config = AugmentConfig::default().with_fill_mode(FillMode::Constant(120.0));
        let size = ImageSize {
            width: 4,
            height: 1,
        };
        let image = Image::<u8, 1>::new(size, vec![10, 20, 30, 40])?;

        let params = TransformParams {
            shift_x: 0.25,
            ..Default::default()
        };
        let shifted = params.apply(&image, &config.image_view())?;
        assert_eq!(shifted.as_slice(), &[120, 10, 20, 30]);

        let label = params.apply(&image, &config.label_view())?;
        assert_eq!(label.as_slice(), &[10, 10, 20, 30]);
        Ok(())
    }
}
