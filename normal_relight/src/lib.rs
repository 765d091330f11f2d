// THEORY:
// This file is the main entry point for the `normal_relight` library crate.
// It exposes the two halves of the engine as a clean public API:
//
// 1.  **The Compositor** (`compositor`): a pure function that relights an image
//     from a surface-normal map, a light position and a handful of shadow and
//     highlight tuning parameters. No I/O, no shared state.
// 2.  **The Handoff** (`handoff`): the machinery that parks a pipeline worker
//     while an external editor decides how the image should be relit, then
//     resumes it with the editor's result or with the untouched original.
//
// The lower-level math lives in `core_modules` and the byte-level image
// encoding lives in `codec`; callers normally only need the re-exports below.

pub mod bus;
pub mod codec;
pub mod compositor;
pub mod core_modules;
pub mod error;
pub mod handoff;
pub mod nodes;

pub use bus::{EditorBus, PreviewNotice, PreviewSink};
pub use compositor::{relight, RelightParams};
pub use core_modules::color::Color;
pub use error::{Error, Result};
pub use handoff::{HandoffBridge, HandoffRegistry, RequestId};

use ndarray::Array4;

/// Image tensor in NHWC layout (batch, height, width, channels).
/// Samples are in [0, 1]; channels past the third are carried through untouched.
pub type Image = Array4<f32>;
