//! Flatten layer: [C, L] → [C*L].
//!
//! Pure relabeling. Activations are already stored channel-major, so element
//! `c * L + p` of the flat vector is `input[c][p]`. A pipeline skips the copy
//! when the data can stay in its buffer; `forward` only runs when flatten is
//! the first or last layer.

use crate::error::{CnnError, CnnResult};
use crate::math::{NumberFormat, Sample};
use super::{Layer, LayerKind, Shape};

pub struct FlattenLayer;

impl Layer for FlattenLayer {
    fn name(&self) -> &'static str { "Flatten" }
    fn kind(&self) -> LayerKind { LayerKind::Flatten }

    fn output_shape(&self, input_shape: &Shape) -> CnnResult<Shape> {
        Ok(Shape::d1(input_shape.total()))
    }

    fn forward(&self, input: &[Sample], input_shape: &Shape, output: &mut [Sample], _format: NumberFormat) -> CnnResult<Shape> {
        let total = input_shape.total();
        if input.len() != total {
            return Err(CnnError::DimensionMismatch { expected: total, actual: input.len() });
        }
        if output.len() != total {
            return Err(CnnError::DimensionMismatch { expected: total, actual: output.len() });
        }
        output.copy_from_slice(input);
        Ok(Shape::d1(total))
    }

    fn is_reshape(&self) -> bool { true }
}
