//! # fixcnn-core: fixed-point 1-D CNN inference
//!
//! A `no_std` library for running small 1-D convolutional classifiers on
//! microcontrollers. Activations and weights are Q7.9 `i16`, and dot products
//! accumulate in `i32`.
//!
//! ## Architecture
//!
//! - **Layer Zoo**: Conv1D, MaxPool1D, AvgPool1D, Flatten, Dense
//! - **Static weights**: layers borrow their weights (`&'static` on an MCU)
//! - **Two activation slots**: a pipeline ping-pongs between a front and a
//!   back buffer, sized once when the pipeline is built
//! - **Arena**: the slots come from a caller-owned `&mut [i16]`
//!
//! With the `std` feature (on by default) a model can also be described by a
//! JSON topology plus a little-endian weight blob, see [`loader::ModelBundle`].
//!
//! ## Usage
//!
//! ```ignore
//! use fixcnn_core::*;
//!
//! let conv = Conv1DLayer::new(CONV_K, CONV_B, 1, 8, 20, 10, Activation::Relu)?;
//! let pool = MaxPool1DLayer::non_overlapping(2)?;
//! let flat = FlattenLayer;
//! let dense = DenseLayer::new(DENSE_K, DENSE_B, 8 * 799, 5, Activation::Linear)?;
//!
//! let layers: &[&dyn Layer] = &[&conv, &pool, &flat, &dense];
//! let pipeline = Pipeline::new(layers, Shape::d2(1, 16000), NumberFormat::Q7_9)?;
//!
//! let mut scratch = [0i16; 32768];
//! let mut arena = Arena::new(&mut scratch);
//! let mut scores = [0i16; 5];
//! let class = pipeline.predict(&audio, &mut scores, &mut arena)?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod arena;
pub mod error;
pub mod layers;
pub mod math;
pub mod model;
pub mod tensor;

#[cfg(feature = "std")]
pub mod loader;
#[cfg(feature = "std")]
pub mod topology;

pub use arena::{Arena, BufferPlan, DoubleBuffer};
pub use error::{CnnError, CnnResult};
pub use layers::{
    Activation, AvgPool1DLayer, Conv1DLayer, DenseLayer, FlattenLayer, Layer, LayerKind, MaxPool1DLayer, Shape,
};
pub use math::{
    argmax, avg_pool1d, conv1d, dense, max_pool1d, window_output_len, Accumulator, Conv1dParams, NumberFormat,
    Pool1dParams, Sample, FIXED_POINT,
};
pub use model::Pipeline;
pub use tensor::{ActivationStore, Tensor};

#[cfg(feature = "std")]
pub use loader::{LoadError, ModelBundle, WeightBlob};
#[cfg(feature = "std")]
pub use topology::{InputSpec, LayerSpec, Topology};
