// THEORY:
// The compositor is the automatic half of the engine: given an image, a normal
// map and a set of lighting parameters, it produces a relit copy of the image.
// It is a pure function. The input is never modified, there is no shared
// state, and it can be called from any number of threads at once.
//
// Per pixel, the pipeline is:
//   decoded normal -> diffuse -> shadow/highlight masks -> intensity and tint
//   -> rgb * intensity * brightness * tint, clamped to [0, 1].
// Channels past the third (usually alpha) are copied through as they are.

use serde::{Deserialize, Serialize};

use crate::core_modules::color::Color;
use crate::core_modules::light::LightVector;
use crate::core_modules::normal_map::decode_normals;
use crate::core_modules::shading::Shading;
use crate::error::{Error, Result};
use crate::Image;

/// Every tuning input of the automatic relight node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelightParams {
    /// Horizontal light position across the image, 0 = left edge.
    pub x: f32,
    /// Vertical light position down the image, 0 = top edge.
    pub y: f32,
    /// Light depth; positive values sit in front of the image.
    pub z: f32,
    pub brightness: f32,
    pub shadow_range: f32,
    pub shadow_strength: f32,
    pub highlight_range: f32,
    pub highlight_strength: f32,
    pub highlight_color: Color,
    pub shadow_color: Color,
}

impl Default for RelightParams {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            z: 1.0,
            brightness: 1.0,
            shadow_range: 1.0,
            shadow_strength: 1.0,
            highlight_range: 1.0,
            highlight_strength: 1.0,
            highlight_color: Color::WHITE,
            shadow_color: Color::BLACK,
        }
    }
}

impl RelightParams {
    /// Replaces both tint colours from `#RRGGBB` strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if either string is malformed.
    pub fn with_hex_colors(mut self, highlight: &str, shadow: &str) -> Result<Self> {
        self.highlight_color = Color::from_hex(highlight)?;
        self.shadow_color = Color::from_hex(shadow)?;
        Ok(self)
    }

    fn shading(&self) -> Shading {
        Shading::new(
            self.shadow_range,
            self.shadow_strength,
            self.highlight_range,
            self.highlight_strength,
            self.highlight_color,
            self.shadow_color,
        )
    }
}

/// Relights `image` using `normals` and `params`.
///
/// `normals` may differ from `image` in resolution (it is resampled) and may
/// carry a single batch entry that is shared by every image in the batch.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for a degenerate light direction and
/// [`Error::ShapeMismatch`] when the tensors cannot be paired up.
pub fn relight(image: &Image, normals: &Image, params: &RelightParams) -> Result<Image> {
    let (batch, height, width, channels) = image.dim();
    if channels < 3 {
        return Err(Error::ShapeMismatch {
            expected: "image with at least 3 channels".to_string(),
            actual: format!("{channels} channels"),
        });
    }

    let normal_batch = normals.dim().0;
    if normal_batch != batch && normal_batch != 1 {
        return Err(Error::ShapeMismatch {
            expected: format!("normal map batch of 1 or {batch}"),
            actual: format!("batch of {normal_batch}"),
        });
    }

    let light = LightVector::from_screen(params.x, params.y, params.z)?;
    let normals = decode_normals(normals, height, width)?;
    let shading = params.shading();

    let mut relit = image.clone();
    for b in 0..batch {
        let nb = if normal_batch == 1 { 0 } else { b };
        for y in 0..height {
            for x in 0..width {
                let normal = [
                    normals[[nb, y, x, 0]],
                    normals[[nb, y, x, 1]],
                    normals[[nb, y, x, 2]],
                ];
                let diffuse = Shading::diffuse(&light, normal);
                let shadow_mask = shading.shadow_mask(diffuse);
                let highlight_mask = shading.highlight_mask(diffuse);

                let scale = shading.intensity(shadow_mask, highlight_mask) * params.brightness;
                let tint = shading.tint(shadow_mask);

                for (c, t) in tint.iter().enumerate() {
                    let sample = &mut relit[[b, y, x, c]];
                    *sample = (*sample * scale * t).clamp(0.0, 1.0);
                }
            }
        }
    }

    Ok(relit)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic, well-spread samples in [0, 1].
    fn noise(shape: (usize, usize, usize, usize), seed: u32) -> Image {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        Image::from_shape_fn(shape, |_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            #[allow(clippy::cast_precision_loss)]
            let v = (state % 10_000) as f32 / 9_999.0;
            v
        })
    }

    #[test]
    fn output_keeps_shape_and_range() {
        let image = noise((2, 9, 7, 4), 1);
        let normals = noise((1, 5, 11, 3), 2);
        let params = RelightParams {
            x: 0.1,
            y: 0.8,
            z: -0.3,
            brightness: 2.7,
            shadow_range: 0.3,
            shadow_strength: 0.2,
            highlight_range: 1.7,
            highlight_strength: 2.0,
            ..RelightParams::default()
        }
        .with_hex_colors("#FFAA00", "#102030")
        .unwrap();

        let relit = relight(&image, &normals, &params).unwrap();
        assert_eq!(relit.dim(), image.dim());
        for ((_, _, _, c), v) in relit.indexed_iter() {
            if c < 3 {
                assert!((0.0..=1.0).contains(v));
            }
        }
    }

    #[test]
    fn neutral_parameters_are_identity() {
        let image = noise((1, 6, 6, 3), 3);
        let normals = noise((1, 6, 6, 3), 4);

        let relit = relight(&image, &normals, &RelightParams::default()).unwrap();
        for (a, b) in relit.iter().zip(image.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn extra_channels_pass_through() {
        let image = noise((1, 4, 4, 4), 5);
        let normals = noise((1, 4, 4, 3), 6);
        let params = RelightParams {
            brightness: 3.0,
            shadow_strength: 2.0,
            ..RelightParams::default()
        };

        let relit = relight(&image, &normals, &params).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(relit[[0, y, x, 3]], image[[0, y, x, 3]]);
            }
        }
    }

    #[test]
    fn brightness_never_darkens() {
        let image = noise((1, 8, 8, 3), 7);
        let normals = noise((1, 8, 8, 3), 8);
        let base = RelightParams {
            x: 0.2,
            y: 0.3,
            shadow_strength: 1.4,
            ..RelightParams::default()
        };
        let brighter = RelightParams {
            brightness: 2.0,
            ..base
        };

        let a = relight(&image, &normals, &base).unwrap();
        let b = relight(&image, &normals, &brighter).unwrap();
        for (lo, hi) in a.iter().zip(b.iter()) {
            assert!(hi >= lo);
        }
    }

    #[test]
    fn straight_on_light_ignores_normal_xy() {
        // Shadow strength 2 zeroes everything outside the shadow mask, so the
        // output is rgb * mask, and the mask equals (n_z + 1) / 2 at range 1.
        let image = Image::from_elem((1, 1, 3, 3), 1.0);
        let mut normals = Image::zeros((1, 1, 3, 3));
        let n_z = [0.9, 0.4, 0.1];
        for (x, nz) in n_z.iter().enumerate() {
            normals[[0, 0, x, 0]] = [0.0, 0.7, 1.0][x];
            normals[[0, 0, x, 1]] = [1.0, 0.2, 0.5][x];
            normals[[0, 0, x, 2]] = *nz;
        }
        let params = RelightParams {
            shadow_strength: 2.0,
            ..RelightParams::default()
        };

        let relit = relight(&image, &normals, &params).unwrap();
        for (x, nz) in n_z.iter().enumerate() {
            let decoded = nz * 2.0 - 1.0;
            let expected = (decoded + 1.0) / 2.0;
            assert!((relit[[0, 0, x, 0]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn per_image_normals_follow_batch() {
        let image = Image::from_elem((2, 2, 2, 3), 1.0);
        let mut normals = Image::zeros((2, 2, 2, 3));
        // Batch 0 faces the viewer, batch 1 faces away.
        normals.slice_mut(ndarray::s![0, .., .., 2]).fill(1.0);
        let params = RelightParams {
            shadow_strength: 2.0,
            ..RelightParams::default()
        };

        let relit = relight(&image, &normals, &params).unwrap();
        assert!((relit[[0, 1, 1, 0]] - 1.0).abs() < 1e-6);
        assert!(relit[[1, 1, 1, 0]].abs() < 1e-6);
    }

    #[test]
    fn mismatched_batches_are_rejected() {
        let image = Image::zeros((3, 2, 2, 3));
        let normals = Image::zeros((2, 2, 2, 3));
        assert!(matches!(
            relight(&image, &normals, &RelightParams::default()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn degenerate_light_is_rejected() {
        let image = Image::zeros((1, 2, 2, 3));
        let params = RelightParams {
            z: 0.0,
            ..RelightParams::default()
        };
        assert!(matches!(
            relight(&image, &image, &params),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn malformed_colour_is_rejected() {
        assert!(RelightParams::default().with_hex_colors("#FFF", "#000000").is_err());
    }
}
