//! Pooling layers: MaxPool1D and AvgPool1D.
//!
//! No learnable parameters. Both slide a window of `pool_size` samples with
//! `stride` along each channel independently. Padding is not supported and
//! is rejected at construction.

use crate::error::CnnResult;
use crate::math::{self, NumberFormat, Pool1dParams, Sample};
use super::{Layer, LayerKind, Shape};

/// Max pooling: [C, L] → [C, L'] where L' = (L - pool_size) / stride + 1.
pub struct MaxPool1DLayer {
    params: Pool1dParams,
}

impl MaxPool1DLayer {
    pub fn new(pool_size: usize, stride: usize, padding: usize) -> CnnResult<Self> {
        Ok(Self { params: Pool1dParams::new(LayerKind::MaxPool, pool_size, stride, padding)? })
    }

    /// Window and stride of the same size (the only layout the models use).
    pub fn non_overlapping(size: usize) -> CnnResult<Self> {
        Self::new(size, size, 0)
    }

    /// Start the running maximum at zero instead of the first window element.
    pub fn with_relu(mut self, relu: bool) -> Self {
        self.params.relu = relu;
        self
    }

    pub fn params(&self) -> &Pool1dParams { &self.params }
}

impl Layer for MaxPool1DLayer {
    fn name(&self) -> &'static str { "MaxPool1D" }
    fn kind(&self) -> LayerKind { LayerKind::MaxPool }

    fn output_shape(&self, input_shape: &Shape) -> CnnResult<Shape> {
        self.params.output_shape(LayerKind::MaxPool, input_shape)
    }

    fn forward(&self, input: &[Sample], input_shape: &Shape, output: &mut [Sample], _format: NumberFormat) -> CnnResult<Shape> {
        let out_shape = self.output_shape(input_shape)?;
        math::max_pool1d(input, output, input_shape.channels(), input_shape.length(), &self.params)?;
        Ok(out_shape)
    }
}

/// Average pooling with truncating integer division.
pub struct AvgPool1DLayer {
    params: Pool1dParams,
}

impl AvgPool1DLayer {
    pub fn new(pool_size: usize, stride: usize, padding: usize) -> CnnResult<Self> {
        Ok(Self { params: Pool1dParams::new(LayerKind::AvgPool, pool_size, stride, padding)? })
    }

    pub fn non_overlapping(size: usize) -> CnnResult<Self> {
        Self::new(size, size, 0)
    }

    /// Floor negative window sums at zero before dividing.
    pub fn with_relu(mut self, relu: bool) -> Self {
        self.params.relu = relu;
        self
    }

    pub fn params(&self) -> &Pool1dParams { &self.params }
}

impl Layer for AvgPool1DLayer {
    fn name(&self) -> &'static str { "AvgPool1D" }
    fn kind(&self) -> LayerKind { LayerKind::AvgPool }

    fn output_shape(&self, input_shape: &Shape) -> CnnResult<Shape> {
        self.params.output_shape(LayerKind::AvgPool, input_shape)
    }

    fn forward(&self, input: &[Sample], input_shape: &Shape, output: &mut [Sample], format: NumberFormat) -> CnnResult<Shape> {
        let out_shape = self.output_shape(input_shape)?;
        math::avg_pool1d(input, output, input_shape.channels(), input_shape.length(), &self.params, format)?;
        Ok(out_shape)
    }
}
