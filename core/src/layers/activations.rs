//! Activation selector fused into convolution and dense layers.
//!
//! Activations are not separate layers here: they are applied to the
//! accumulator right before it is narrowed, which is the only place the
//! ReLU zero test can happen without losing information.

use crate::math::{Accumulator, NumberFormat, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Activation {
    /// Identity ("linear" in the exported models).
    #[default]
    Linear,
    /// max(0, x), tested on the wide value.
    Relu,
}

impl Activation {
    /// Apply the activation to a rescaled, biased accumulator and narrow it.
    ///
    /// For ReLU the sign test runs before saturation: a very negative value
    /// becomes 0, not `SAMPLE_MIN`.
    #[inline(always)]
    pub fn apply(self, acc: Accumulator, format: NumberFormat) -> Sample {
        match self {
            Activation::Linear => format.saturate(acc),
            Activation::Relu if acc < 0 => 0,
            Activation::Relu => format.saturate(acc),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
        }
    }
}
