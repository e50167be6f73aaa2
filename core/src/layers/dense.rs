//! Dense (fully-connected) layer with read-only weights.

use crate::error::{CnnError, CnnResult};
use crate::math::{self, NumberFormat, Sample};
use super::{Activation, Layer, LayerKind, Shape};

/// Every output unit reads every input element.
///
/// Accepts either a flat vector or a `[C, L]` activation with `C*L` inputs;
/// the latter is read in channel-major order, exactly as a flatten would.
pub struct DenseLayer<'w> {
    weights: &'w [Sample],
    bias: &'w [Sample],
    in_features: usize,
    out_features: usize,
    activation: Activation,
}

impl<'w> DenseLayer<'w> {
    pub fn new(
        weights: &'w [Sample], bias: &'w [Sample],
        in_features: usize, out_features: usize,
        activation: Activation,
    ) -> CnnResult<Self> {
        let kernel_len = Self::kernel_len(in_features, out_features)?;
        if weights.len() != kernel_len {
            return Err(CnnError::WeightMismatch { what: "dense kernel", expected: kernel_len, actual: weights.len() });
        }
        if bias.len() != out_features {
            return Err(CnnError::WeightMismatch { what: "dense bias", expected: out_features, actual: bias.len() });
        }
        Ok(Self { weights, bias, in_features, out_features, activation })
    }

    /// Validates both dimensions and returns `out_features * in_features`.
    pub fn kernel_len(in_features: usize, out_features: usize) -> CnnResult<usize> {
        if in_features == 0 {
            return Err(CnnError::ZeroDimension { layer: LayerKind::Dense, what: "in_features" });
        }
        if out_features == 0 {
            return Err(CnnError::ZeroDimension { layer: LayerKind::Dense, what: "units" });
        }
        math::checked_size(out_features, in_features, "dense kernel")
    }

    pub fn in_features(&self) -> usize { self.in_features }
    pub fn out_features(&self) -> usize { self.out_features }
    pub fn activation(&self) -> Activation { self.activation }
    pub fn weights(&self) -> &'w [Sample] { self.weights }
    pub fn bias(&self) -> &'w [Sample] { self.bias }
}

impl Layer for DenseLayer<'_> {
    fn name(&self) -> &'static str { "Dense" }
    fn kind(&self) -> LayerKind { LayerKind::Dense }

    fn output_shape(&self, input_shape: &Shape) -> CnnResult<Shape> {
        if input_shape.total() != self.in_features {
            return Err(CnnError::ShapeMismatch {
                layer: LayerKind::Dense,
                channels: input_shape.channels(),
                length: input_shape.length(),
            });
        }
        Ok(Shape::d1(self.out_features))
    }

    fn forward(&self, input: &[Sample], input_shape: &Shape, output: &mut [Sample], format: NumberFormat) -> CnnResult<Shape> {
        let out_shape = self.output_shape(input_shape)?;
        math::dense(input, self.weights, self.bias, output, self.activation, format)?;
        Ok(out_shape)
    }
}
