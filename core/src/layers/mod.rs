//! Layer zoo for 1-D fixed-point CNNs.

pub mod activations;
pub mod conv;
pub mod dense;
pub mod flatten;
pub mod pooling;

use crate::error::CnnResult;
use crate::math::{NumberFormat, Sample};

/// Shape of an activation: `[channels × length]` (channel-major) or a flat vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub dims: [usize; 2],
    pub ndim: usize,
}

impl Shape {
    /// Flat vector of `size` elements.
    pub const fn d1(size: usize) -> Self {
        Self { dims: [size, 0], ndim: 1 }
    }

    /// `channels` sequences of `length` samples each.
    pub const fn d2(channels: usize, length: usize) -> Self {
        Self { dims: [channels, length], ndim: 2 }
    }

    /// Element count, saturating at `usize::MAX`.
    pub fn total(&self) -> usize {
        self.dims[..self.ndim].iter().fold(1, |acc: usize, &d| acc.saturating_mul(d))
    }

    /// Element count, or `None` if it does not fit in `usize`.
    pub fn checked_total(&self) -> Option<usize> {
        self.dims[..self.ndim].iter().try_fold(1, |acc: usize, &d| acc.checked_mul(d))
    }

    pub fn channels(&self) -> usize {
        if self.ndim == 2 { self.dims[0] } else { 1 }
    }

    pub fn length(&self) -> usize {
        if self.ndim == 2 { self.dims[1] } else { self.dims[0] }
    }

    pub fn is_flat(&self) -> bool {
        self.ndim == 1
    }
}

/// Tag for each layer kind; also used to label errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Conv,
    MaxPool,
    AvgPool,
    Flatten,
    Dense,
}

/// A pure function over samples with a fixed shape contract.
///
/// Layers never allocate: the caller hands in an output slice sized exactly
/// to `output_shape(input_shape).total()`.
pub trait Layer: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> LayerKind;

    fn output_shape(&self, input_shape: &Shape) -> CnnResult<Shape>;

    fn forward(
        &self,
        input: &[Sample],
        input_shape: &Shape,
        output: &mut [Sample],
        format: NumberFormat,
    ) -> CnnResult<Shape>;

    /// True when the layer only relabels the shape; a pipeline may then
    /// leave the data where it is instead of calling `forward`.
    fn is_reshape(&self) -> bool {
        false
    }
}

pub use activations::Activation;
pub use conv::Conv1DLayer;
pub use dense::DenseLayer;
pub use flatten::FlattenLayer;
pub use pooling::{AvgPool1DLayer, MaxPool1DLayer};
