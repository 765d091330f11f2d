// THEORY:
// Shading turns one diffuse value into two multipliers for the pixel: a scalar
// light intensity and an RGB tint.
//
// 1.  **Diffuse**: `n . l` remapped from [-1, 1] to [0, 1], so 0.5 means the
//     surface is edge-on to the light.
// 2.  **Masks**: each of shadow and highlight has a range `r`. Its threshold
//     is `1 - r` and its mask ramps linearly from 0 at the threshold to 1 one
//     range further up, clamped. A range of 1 therefore ramps across [0, 1].
// 3.  **Intensity**: shadow strength scales whatever lies outside the shadow
//     mask by `2 - strength`; highlight strength adds `strength - 1` inside the
//     highlight mask. Either step is skipped entirely at strength 1.
// 4.  **Tint**: a blend from the shadow colour to the highlight colour. Both
//     ends are driven by the *shadow* mask; the highlight mask takes no part.

use super::color::Color;
use super::light::LightVector;

/// Guards the mask ramps against a zero range.
const RANGE_EPSILON: f32 = 1e-6;

/// Pre-computed thresholds for one set of shadow/highlight parameters.
#[derive(Debug, Clone, Copy)]
pub struct Shading {
    shadow_threshold: f32,
    shadow_span: f32,
    shadow_strength: f32,
    highlight_threshold: f32,
    highlight_span: f32,
    highlight_strength: f32,
    tint: Option<(Color, Color)>,
}

impl Shading {
    pub fn new(
        shadow_range: f32,
        shadow_strength: f32,
        highlight_range: f32,
        highlight_strength: f32,
        highlight_color: Color,
        shadow_color: Color,
    ) -> Self {
        let tint = (highlight_color != Color::WHITE || shadow_color != Color::BLACK)
            .then_some((highlight_color, shadow_color));

        Self {
            shadow_threshold: 1.0 - shadow_range,
            shadow_span: shadow_range.max(RANGE_EPSILON),
            shadow_strength,
            highlight_threshold: 1.0 - highlight_range,
            highlight_span: highlight_range.max(RANGE_EPSILON),
            highlight_strength,
            tint,
        }
    }

    /// Diffuse term in [0, 1] for a decoded normal.
    #[inline]
    pub fn diffuse(light: &LightVector, normal: [f32; 3]) -> f32 {
        (light.dot(normal) + 1.0) * 0.5
    }

    #[inline]
    pub fn shadow_mask(&self, diffuse: f32) -> f32 {
        ((diffuse - self.shadow_threshold) / self.shadow_span).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn highlight_mask(&self, diffuse: f32) -> f32 {
        ((diffuse - self.highlight_threshold) / self.highlight_span).clamp(0.0, 1.0)
    }

    /// Scalar light intensity for one pixel.
    #[allow(clippy::float_cmp)]
    #[inline]
    pub fn intensity(&self, shadow_mask: f32, highlight_mask: f32) -> f32 {
        let mut intensity = 1.0;
        if self.shadow_strength != 1.0 {
            intensity *= (1.0 - shadow_mask).mul_add(2.0 - self.shadow_strength, shadow_mask);
        }
        if self.highlight_strength != 1.0 {
            intensity += highlight_mask * (self.highlight_strength - 1.0);
        }
        intensity
    }

    /// Per-channel tint for one pixel; plain white when no tint is configured.
    #[inline]
    pub fn tint(&self, shadow_mask: f32) -> [f32; 3] {
        match self.tint {
            None => [1.0; 3],
            Some((highlight, shadow)) => std::array::from_fn(|c| {
                shadow_mask.mul_add(highlight.0[c], (1.0 - shadow_mask) * shadow.0[c])
            }),
        }
    }
}
