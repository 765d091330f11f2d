//! Per-pixel building blocks used by the compositor.

pub mod color;
pub mod light;
pub mod normal_map;
pub mod shading;
