use std::f32::consts::PI;

use geoaug_image::{Image, ImageError};

use crate::interpolation::{interpolate_pixel, InterpolationMode};
use crate::parallel;

/// How destination pixels that map outside the source image are filled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FillMode {
    /// Fill with a constant value on every channel.
    Constant(f32),
    /// Replicate the closest border pixel.
    #[default]
    Nearest,
}

/// Inverts a 2x3 affine transformation matrix.
///
/// Arguments:
///
/// * `m` - The 2x3 affine transformation matrix.
///
/// Returns:
///
/// The inverted 2x3 affine transformation matrix.
pub fn invert_affine_transform(m: &[f32; 6]) -> [f32; 6] {
    let (a, b, c, d, e, f) = (m[0], m[1], m[2], m[3], m[4], m[5]);

    // follow OpenCV: a singular matrix maps everything to the origin
    let determinant = a * e - b * d;
    let inv_determinant = if determinant != 0.0 {
        1.0 / determinant
    } else {
        0.0
    };

    let new_a = e * inv_determinant;
    let new_b = -b * inv_determinant;
    let new_d = -d * inv_determinant;
    let new_e = a * inv_determinant;
    let new_c = -(new_a * c + new_b * f);
    let new_f = -(new_d * c + new_e * f);

    [new_a, new_b, new_c, new_d, new_e, new_f]
}

/// Returns a 2x3 rotation matrix for a 2D rotation around a center point.
///
/// The rotation matrix is defined as:
///
/// | alpha  beta  tx |
/// | -beta  alpha ty |
///
/// where:
///
/// alpha = scale * cos(angle)
/// beta = scale * sin(angle)
/// tx = (1 - alpha) * center.x - beta * center.y
/// ty = beta * center.x + (1 - alpha) * center.y
///
/// # Arguments
///
/// * `center` - The center point of the rotation.
/// * `angle` - The angle of rotation in degrees.
/// * `scale` - The scale factor.
pub fn get_rotation_matrix2d(center: (f32, f32), angle: f32, scale: f32) -> [f32; 6] {
    let angle = angle * PI / 180.0f32;
    let alpha = scale * angle.cos();
    let beta = scale * angle.sin();

    let tx = (1.0 - alpha) * center.0 - beta * center.1;
    let ty = beta * center.0 + (1.0 - alpha) * center.1;

    [alpha, beta, tx, -beta, alpha, ty]
}

/// Returns the matrix rotating by `angle` degrees about the image center and
/// then translating by `(shift_x, shift_y)` pixels.
pub fn get_rotation_shift_matrix2d(
    center: (f32, f32),
    angle: f32,
    shift_x: f32,
    shift_y: f32,
) -> [f32; 6] {
    let mut m = get_rotation_matrix2d(center, angle, 1.0);
    m[2] += shift_x;
    m[5] += shift_y;
    m
}

/// Applies an affine transformation to a point.
fn transform_point(x: f32, y: f32, m: &[f32; 6]) -> (f32, f32) {
    let u = m[0] * x + m[1] * y + m[2];
    let v = m[3] * x + m[4] * y + m[5];
    (u, v)
}

/// Applies an affine transformation to an image.
///
/// # Arguments
///
/// * `src` - The input image with shape (height, width, channels).
/// * `dst` - The output image with shape (height, width, channels).
/// * `m` - The 2x3 affine transformation matrix mapping source to destination.
/// * `interpolation` - The interpolation mode to use.
/// * `fill` - How to fill destination pixels falling outside the source.
///
/// # Example
///
/// ```
/// use geoaug_image::{Image, ImageSize};
/// use geoaug_imgproc::interpolation::InterpolationMode;
/// use geoaug_imgproc::warp::{warp_affine, FillMode};
///
/// let src = Image::<_, 3>::from_size_val(ImageSize { width: 4, height: 5 }, 1f32).unwrap();
/// let mut dst = Image::<_, 3>::from_size_val(src.size(), 0.0).unwrap();
///
/// let m = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
/// warp_affine(&src, &mut dst, &m, InterpolationMode::Nearest, FillMode::Nearest).unwrap();
///
/// assert_eq!(dst.as_slice(), src.as_slice());
/// ```
pub fn warp_affine<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    m: &[f32; 6],
    interpolation: InterpolationMode,
    fill: FillMode,
) -> Result<(), ImageError> {
    if src.size().area() == 0 {
        return Err(ImageError::EmptyImage);
    }

    // invert affine transform matrix to find corresponding positions in src from dst
    let m_inv = invert_affine_transform(m);
    let (max_x, max_y) = ((src.cols() - 1) as f32, (src.rows() - 1) as f32);

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let (u, v) = transform_point(x as f32, y as f32, &m_inv);
        let inside = (-0.5..max_x + 0.5).contains(&u) && (-0.5..max_y + 0.5).contains(&v);

        match (inside, fill) {
            (false, FillMode::Constant(value)) => dst_pixel.fill(value),
            _ => {
                let pixel = interpolate_pixel(src, u, v, interpolation);
                dst_pixel.copy_from_slice(&pixel);
            }
        }
    });

    Ok(())
}
