// THEORY:
// A normal map stores a direction per pixel with each component squeezed from
// [-1, 1] into [0, 1] so it fits an ordinary RGB image. Before shading we undo
// that mapping and, if the map was rendered at a different resolution than the
// image being relit, resample it to match.
//
// Resampling is plain bilinear with half-pixel centres (the `align_corners =
// false` convention), operating on the already decoded vectors. The vectors are
// deliberately NOT re-normalized afterwards; interpolated normals come out a
// little short and the shading formula accounts for that as-is.

use ndarray::{s, Array4};

use crate::error::{Error, Result};
use crate::Image;

/// Decodes a stored normal map into [-1, 1] vectors at `height` x `width`.
///
/// Only the first three channels are read. The result has shape
/// `(batch, height, width, 3)`.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the map has fewer than three channels
/// or no pixels.
pub fn decode_normals(normals: &Image, height: usize, width: usize) -> Result<Array4<f32>> {
    let (_, src_h, src_w, channels) = normals.dim();

    if channels < 3 {
        return Err(Error::ShapeMismatch {
            expected: "normal map with at least 3 channels".to_string(),
            actual: format!("{channels} channels"),
        });
    }
    if src_h == 0 || src_w == 0 {
        return Err(Error::ShapeMismatch {
            expected: "non-empty normal map".to_string(),
            actual: format!("{src_h}x{src_w}"),
        });
    }

    let decoded = normals
        .slice(s![.., .., .., 0..3])
        .mapv(|v| v.mul_add(2.0, -1.0));

    if (src_h, src_w) == (height, width) {
        return Ok(decoded);
    }

    tracing::debug!("resampling normal map {src_h}x{src_w} -> {height}x{width}");
    Ok(resize_bilinear(&decoded, height, width))
}

/// One output coordinate's two source neighbours and the weight of the second.
#[derive(Debug, Clone, Copy)]
struct Tap {
    i0: usize,
    i1: usize,
    w1: f32,
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn taps(src: usize, dst: usize) -> Vec<Tap> {
    let scale = src as f32 / dst as f32;
    (0..dst)
        .map(|d| {
            let real = (d as f32 + 0.5).mul_add(scale, -0.5).max(0.0);
            let i0 = (real as usize).min(src - 1);
            let i1 = if i0 < src - 1 { i0 + 1 } else { i0 };
            Tap {
                i0,
                i1,
                w1: real - i0 as f32,
            }
        })
        .collect()
}

/// Bilinear resize over the two spatial axes of an NHWC tensor.
fn resize_bilinear(src: &Array4<f32>, height: usize, width: usize) -> Array4<f32> {
    let (batch, src_h, src_w, channels) = src.dim();
    let rows = taps(src_h, height);
    let cols = taps(src_w, width);

    Array4::from_shape_fn((batch, height, width, channels), |(n, y, x, c)| {
        let Tap { i0: y0, i1: y1, w1: wy } = rows[y];
        let Tap { i0: x0, i1: x1, w1: wx } = cols[x];

        let top = src[[n, y0, x0, c]] * (1.0 - wx) + src[[n, y0, x1, c]] * wx;
        let bottom = src[[n, y1, x0, c]] * (1.0 - wx) + src[[n, y1, x1, c]] * wx;
        top * (1.0 - wy) + bottom * wy
    })
}
