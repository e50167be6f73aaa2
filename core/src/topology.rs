//! JSON description of a model's layer chain.
//!
//! ```json
//! {
//!   "name": "gsc-fine-tuning",
//!   "format": { "frac_bits": 9 },
//!   "input": { "channels": 1, "length": 16000 },
//!   "layers": [
//!     { "kind": "conv1d", "filters": 8, "kernel_size": 20, "stride": 10, "activation": "relu" },
//!     { "kind": "max_pool1d", "pool_size": 2 },
//!     { "kind": "flatten" },
//!     { "kind": "dense", "units": 5 }
//!   ]
//! }
//! ```
//!
//! The topology carries no weights. [`Topology::weight_layout`] says how many
//! values each weighted layer takes from the blob, in blob order.

use serde::{Deserialize, Serialize};

use crate::error::{CnnError, CnnResult};
use crate::layers::{
    Activation, AvgPool1DLayer, Conv1DLayer, DenseLayer, FlattenLayer, Layer, LayerKind, MaxPool1DLayer, Shape,
};
use crate::math::{Conv1dParams, NumberFormat, Pool1dParams, Sample};

fn one() -> usize {
    1
}

/// Shape of the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub channels: usize,
    pub length: usize,
}

/// One layer of the chain, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv1d {
        filters: usize,
        kernel_size: usize,
        #[serde(default = "one")]
        stride: usize,
        #[serde(default)]
        pad_left: usize,
        #[serde(default)]
        pad_right: usize,
        #[serde(default)]
        activation: Activation,
    },
    MaxPool1d {
        pool_size: usize,
        /// Defaults to `pool_size`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stride: Option<usize>,
        #[serde(default)]
        padding: usize,
        #[serde(default)]
        relu: bool,
    },
    AvgPool1d {
        pool_size: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stride: Option<usize>,
        #[serde(default)]
        padding: usize,
        #[serde(default)]
        relu: bool,
    },
    Flatten,
    Dense {
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
}

impl LayerSpec {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Conv1d { .. } => LayerKind::Conv,
            Self::MaxPool1d { .. } => LayerKind::MaxPool,
            Self::AvgPool1d { .. } => LayerKind::AvgPool,
            Self::Flatten => LayerKind::Flatten,
            Self::Dense { .. } => LayerKind::Dense,
        }
    }
}

/// Kernel and bias sizes of one weighted layer, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightSlot {
    /// Position of the layer in `Topology::layers`.
    pub layer: usize,
    pub kernel: usize,
    pub bias: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub format: NumberFormat,
    pub input: InputSpec,
    pub layers: Vec<LayerSpec>,
}

impl Topology {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn input_shape(&self) -> Shape {
        Shape::d2(self.input.channels, self.input.length)
    }

    /// Walk the chain, checking every layer against the shape it receives, and
    /// return the blob layout plus the final output shape.
    ///
    /// Works from the layer parameters alone; nothing is allocated per layer.
    pub fn weight_layout(&self) -> CnnResult<(Vec<WeightSlot>, Shape)> {
        let mut slots = Vec::new();
        let mut shape = self.input_shape();
        shape.checked_total().ok_or(CnnError::SizeOverflow { what: "input shape" })?;

        for (index, spec) in self.layers.iter().enumerate() {
            let (next, kernel, bias) = match *spec {
                LayerSpec::Conv1d { filters, kernel_size, stride, pad_left, pad_right, activation } => {
                    let params = Conv1dParams {
                        in_channels: shape.channels(),
                        filters,
                        kernel_size,
                        stride,
                        pad_left,
                        pad_right,
                        activation,
                    };
                    params.validate()?;
                    (params.output_shape(&shape)?, params.kernel_len()?, filters)
                }
                LayerSpec::MaxPool1d { pool_size, stride, padding, .. }
                | LayerSpec::AvgPool1d { pool_size, stride, padding, .. } => {
                    let kind = spec.kind();
                    let params = Pool1dParams::new(kind, pool_size, stride.unwrap_or(pool_size), padding)?;
                    (params.output_shape(kind, &shape)?, 0, 0)
                }
                LayerSpec::Flatten => (FlattenLayer.output_shape(&shape)?, 0, 0),
                LayerSpec::Dense { units, .. } => {
                    (Shape::d1(units), DenseLayer::kernel_len(shape.total(), units)?, units)
                }
            };
            if kernel > 0 {
                slots.push(WeightSlot { layer: index, kernel, bias });
            }
            shape = next;
        }
        total_weights(&slots)?;
        Ok((slots, shape))
    }

    /// Total number of `i16` values the weight blob must hold.
    pub fn weight_count(&self) -> CnnResult<usize> {
        let (slots, _) = self.weight_layout()?;
        total_weights(&slots)
    }
}

/// Sum of every kernel and bias in `slots`.
pub(crate) fn total_weights(slots: &[WeightSlot]) -> CnnResult<usize> {
    slots
        .iter()
        .try_fold(0usize, |acc, s| acc.checked_add(s.kernel)?.checked_add(s.bias))
        .ok_or(CnnError::SizeOverflow { what: "weight count" })
}

/// Instantiate one layer for an input of `shape`, borrowing its weights.
pub(crate) fn build_layer<'w>(
    spec: &LayerSpec,
    shape: Shape,
    kernel: &'w [Sample],
    bias: &'w [Sample],
) -> CnnResult<Box<dyn Layer + 'w>> {
    let layer: Box<dyn Layer + 'w> = match *spec {
        LayerSpec::Conv1d { filters, kernel_size, stride, pad_left, pad_right, activation } => {
            Box::new(Conv1DLayer::with_params(
                kernel,
                bias,
                Conv1dParams {
                    in_channels: shape.channels(),
                    filters,
                    kernel_size,
                    stride,
                    pad_left,
                    pad_right,
                    activation,
                },
            )?)
        }
        LayerSpec::MaxPool1d { pool_size, stride, padding, relu } => Box::new(
            MaxPool1DLayer::new(pool_size, stride.unwrap_or(pool_size), padding)?.with_relu(relu),
        ),
        LayerSpec::AvgPool1d { pool_size, stride, padding, relu } => Box::new(
            AvgPool1DLayer::new(pool_size, stride.unwrap_or(pool_size), padding)?.with_relu(relu),
        ),
        LayerSpec::Flatten => Box::new(FlattenLayer),
        LayerSpec::Dense { units, activation } => {
            Box::new(DenseLayer::new(kernel, bias, shape.total(), units, activation)?)
        }
    };
    Ok(layer)
}
