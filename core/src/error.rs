//! Error types for the fixcnn-core library.
//!
//! Every constructor and every inference entry point returns `CnnResult<T>`
//! instead of panicking. Configuration mistakes surface from `new`, before the
//! first inference call.
//!
//! Saturation and implicit zero-padding are *not* errors and never show up here.

use thiserror::Error;

use crate::layers::LayerKind;

/// All possible error conditions in the fixcnn-core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CnnError {
    #[error("{layer:?}: stride must be at least 1")]
    ZeroStride { layer: LayerKind },

    #[error("{layer:?}: {what} must be at least 1")]
    ZeroDimension {
        layer: LayerKind,
        what: &'static str,
    },

    #[error("{layer:?}: window of {window} does not fit an input of {input} samples (padded)")]
    EmptyOutput {
        layer: LayerKind,
        window: usize,
        input: usize,
    },

    #[error("{layer:?}: padding is not supported (got {padding})")]
    UnsupportedPadding { layer: LayerKind, padding: usize },

    #[error("fractional bit count {frac_bits} is outside 0..16")]
    InvalidFormat { frac_bits: u32 },

    #[error("{what}: expected {expected} values, got {actual}")]
    WeightMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{layer:?}: cannot accept an input of {channels} x {length}")]
    ShapeMismatch {
        layer: LayerKind,
        channels: usize,
        length: usize,
    },

    #[error("buffer too small: need {required} samples, have {available}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("arena exhausted: requested {requested} samples, {remaining} remaining")]
    ArenaExhausted { requested: usize, remaining: usize },

    #[error("{what} does not fit in usize")]
    SizeOverflow { what: &'static str },

    #[error("pipeline has no layers")]
    EmptyPipeline,

    #[error("argmax of an empty slice")]
    EmptyInput,

    #[error("weight blob has an odd byte length ({len})")]
    MisalignedBlob { len: usize },

    #[error("weight blob holds {actual} values but the topology needs {expected}")]
    BlobLength { expected: usize, actual: usize },
}

pub type CnnResult<T> = Result<T, CnnError>;
