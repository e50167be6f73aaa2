//! Conv1D layer with read-only weights.

use crate::error::{CnnError, CnnResult};
use crate::math::{self, Conv1dParams, NumberFormat, Sample};
use super::{Activation, Layer, LayerKind, Shape};

pub struct Conv1DLayer<'w> {
    kernel: &'w [Sample],
    bias: &'w [Sample],
    params: Conv1dParams,
}

impl<'w> Conv1DLayer<'w> {
    /// Unpadded convolution.
    pub fn new(
        kernel: &'w [Sample], bias: &'w [Sample],
        in_channels: usize, filters: usize, kernel_size: usize, stride: usize,
        activation: Activation,
    ) -> CnnResult<Self> {
        Self::with_params(kernel, bias, Conv1dParams {
            in_channels, filters, kernel_size, stride,
            pad_left: 0, pad_right: 0,
            activation,
        })
    }

    pub fn with_params(kernel: &'w [Sample], bias: &'w [Sample], params: Conv1dParams) -> CnnResult<Self> {
        params.validate()?;
        let kernel_len = params.kernel_len()?;
        if kernel.len() != kernel_len {
            return Err(CnnError::WeightMismatch { what: "conv kernel", expected: kernel_len, actual: kernel.len() });
        }
        if bias.len() != params.filters {
            return Err(CnnError::WeightMismatch { what: "conv bias", expected: params.filters, actual: bias.len() });
        }
        Ok(Self { kernel, bias, params })
    }

    pub fn params(&self) -> &Conv1dParams { &self.params }
    pub fn kernel(&self) -> &'w [Sample] { self.kernel }
    pub fn bias(&self) -> &'w [Sample] { self.bias }
}

impl Layer for Conv1DLayer<'_> {
    fn name(&self) -> &'static str { "Conv1D" }
    fn kind(&self) -> LayerKind { LayerKind::Conv }

    fn output_shape(&self, input_shape: &Shape) -> CnnResult<Shape> {
        self.params.output_shape(input_shape)
    }

    fn forward(&self, input: &[Sample], input_shape: &Shape, output: &mut [Sample], format: NumberFormat) -> CnnResult<Shape> {
        let out_shape = self.output_shape(input_shape)?;
        math::conv1d(input, self.kernel, self.bias, output, &self.params, input_shape.length(), format)?;
        Ok(out_shape)
    }
}
