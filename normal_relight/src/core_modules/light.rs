// THEORY:
// The host describes the light as a point on the image (x, y in [0, 1]) plus a
// depth in [-1, 1]. Shading wants a unit direction in normal-map space, where
// +x points right, +y points up and +z points out of the screen. Image rows
// grow downward, so the y axis is flipped on the way in; x is flipped as well
// so that placing the light on the left lights surfaces facing left.

use crate::error::{Error, Result};

/// Below this length the direction is undefined and relighting is refused.
const MIN_LIGHT_MAGNITUDE: f32 = 1e-6;

/// A unit-length light direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LightVector {
    /// Builds the light direction from normalized screen coordinates and depth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when the raw vector is (near) zero,
    /// e.g. `x = 0.5, y = 0.5, z = 0.0`, or when any input is not finite.
    pub fn from_screen(x: f32, y: f32, z: f32) -> Result<Self> {
        let raw = [-(2.0 * x - 1.0), -(2.0 * y - 1.0), z];
        let magnitude = raw.iter().map(|c| c * c).sum::<f32>().sqrt();

        if !magnitude.is_finite() || magnitude < MIN_LIGHT_MAGNITUDE {
            return Err(Error::InvalidParameter {
                name: "light".to_string(),
                reason: format!(
                    "direction from (x={x}, y={y}, z={z}) has no usable length ({magnitude})"
                ),
            });
        }

        Ok(Self {
            x: raw[0] / magnitude,
            y: raw[1] / magnitude,
            z: raw[2] / magnitude,
        })
    }

    /// Lambert term `n . l` for an un-normalized surface normal.
    #[inline]
    pub fn dot(&self, n: [f32; 3]) -> f32 {
        n[0].mul_add(self.x, n[1].mul_add(self.y, n[2] * self.z))
    }

    pub fn length(&self) -> f32 {
        self.dot([self.x, self.y, self.z]).sqrt()
    }
}
