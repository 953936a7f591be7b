use geoaug_image::{Image, ImageError};

use crate::parallel;

/// Scale the brightness of an 8-bit image.
///
/// Every value is multiplied by `factor`, rounded and clamped to `[0, 255]`.
/// A factor of `1.0` leaves the image untouched, `0.0` gives a black image.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `factor` - The non negative brightness multiplier.
///
/// # Returns
///
/// The brightness adjusted image.
///
/// # Example
///
/// ```
/// use geoaug_image::{Image, ImageSize};
/// use geoaug_imgproc::enhance::adjust_brightness;
///
/// let image = Image::<u8, 1>::new(ImageSize { width: 3, height: 1 }, vec![10, 100, 200]).unwrap();
/// let brighter = adjust_brightness(&image, 2.0).unwrap();
///
/// assert_eq!(brighter.as_slice(), &[20, 200, 255]);
/// ```
pub fn adjust_brightness<const C: usize>(
    src: &Image<u8, C>,
    factor: f32,
) -> Result<Image<u8, C>, ImageError> {
    let mut dst = Image::<u8, C>::from_size_val(src.size(), 0)?;

    parallel::par_iter_rows_val(src, &mut dst, |&src_val, dst_val| {
        *dst_val = (src_val as f32 * factor).round().clamp(0.0, 255.0) as u8;
    });

    Ok(dst)
}

/// Shift all channels of an 8-bit image by the same intensity.
///
/// The result is clipped to the value range of the source image, so a shift
/// never introduces values darker or brighter than the input already has.
pub fn channel_shift<const C: usize>(
    src: &Image<u8, C>,
    intensity: f32,
) -> Result<Image<u8, C>, ImageError> {
    let (Some(&min), Some(&max)) = (src.as_slice().iter().min(), src.as_slice().iter().max())
    else {
        return Ok(src.clone());
    };
    let (min, max) = (min as f32, max as f32);

    let mut dst = Image::<u8, C>::from_size_val(src.size(), 0)?;

    parallel::par_iter_rows_val(src, &mut dst, |&src_val, dst_val| {
        *dst_val = (src_val as f32 + intensity).round().clamp(min, max) as u8;
    });

    Ok(dst)
}
