//! Error types for normal_relight.

use thiserror::Error;

/// Main error type for the normal_relight library.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied parameter cannot be used.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Tensor shapes that have to agree do not.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A payload could not be turned into an image.
    #[error("failed to decode image payload: {reason}")]
    Decode { reason: String },

    /// The raster codec rejected the data.
    #[error("image codec error: {0}")]
    ImageCodec(#[from] image::ImageError),

    /// The payload was not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// No outstanding handoff exists for this id.
    #[error("no outstanding request with id {id}")]
    UnknownRequest { id: String },

    /// A handoff with this id is already outstanding.
    #[error("request id {id} is already outstanding")]
    DuplicateRequest { id: String },
}

/// Result type alias for normal_relight operations.
pub type Result<T> = std::result::Result<T, Error>;
