//! Loading a model from a topology file plus a little-endian weight blob.
//!
//! The blob is a flat `i16` stream. Every weighted layer, in topology order,
//! contributes its kernel followed by its bias. Nothing else is stored: no
//! header, no padding, no trailing data.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{CnnError, CnnResult};
use crate::layers::{Layer, Shape};
use crate::math::{NumberFormat, Sample};
use crate::topology::{build_layer, total_weights, Topology, WeightSlot};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Cnn(#[from] CnnError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid topology: {0}")]
    Json(#[from] serde_json::Error),
}

fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })
}

/// Decoded weight values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeightBlob {
    values: Vec<Sample>,
}

impl WeightBlob {
    pub fn from_le_bytes(bytes: &[u8]) -> CnnResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(CnnError::MisalignedBlob { len: bytes.len() });
        }
        let values = bytes
            .chunks_exact(2)
            .map(|pair| Sample::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { values })
    }

    pub fn from_samples(values: Vec<Sample>) -> Self {
        Self { values }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A validated topology together with the weights it consumes.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    topology: Topology,
    weights: WeightBlob,
    slots: Vec<WeightSlot>,
    output_shape: Shape,
}

impl ModelBundle {
    /// Fails when the topology is inconsistent or the blob length does not
    /// match it exactly. The layout is checked before any layer is built.
    pub fn from_parts(topology: Topology, weights: WeightBlob) -> CnnResult<Self> {
        if topology.layers.is_empty() {
            return Err(CnnError::EmptyPipeline);
        }
        let (slots, output_shape) = topology.weight_layout()?;
        let expected = total_weights(&slots)?;
        if weights.len() != expected {
            return Err(CnnError::BlobLength { expected, actual: weights.len() });
        }

        tracing::debug!(
            name = %topology.name,
            layers = topology.layers.len(),
            weights = expected,
            output = output_shape.total(),
            "model bundle loaded"
        );

        Ok(Self { topology, weights, slots, output_shape })
    }

    pub fn from_json_and_bytes(json: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        let topology = Topology::from_json(json)?;
        let weights = WeightBlob::from_le_bytes(bytes)?;
        Ok(Self::from_parts(topology, weights)?)
    }

    pub fn from_files(topology_path: impl AsRef<Path>, weights_path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = read(topology_path.as_ref())?;
        let topology: Topology = serde_json::from_slice(&json)?;
        let weights = WeightBlob::from_le_bytes(&read(weights_path.as_ref())?)?;
        Ok(Self::from_parts(topology, weights)?)
    }

    /// Instantiate the layer chain. Every layer borrows its weights from the bundle.
    pub fn layers(&self) -> CnnResult<Vec<Box<dyn Layer + '_>>> {
        let values = self.weights.as_slice();
        let mut slots = self.slots.iter().peekable();
        let mut offset = 0;
        let mut shape = self.input_shape();
        let mut layers = Vec::with_capacity(self.topology.layers.len());

        for (index, spec) in self.topology.layers.iter().enumerate() {
            let (kernel, bias) = match slots.next_if(|s| s.layer == index) {
                Some(slot) => {
                    let kernel = &values[offset..offset + slot.kernel];
                    let bias = &values[offset + slot.kernel..offset + slot.kernel + slot.bias];
                    offset += slot.kernel + slot.bias;
                    (kernel, bias)
                }
                None => (&values[..0], &values[..0]),
            };
            let layer = build_layer(spec, shape, kernel, bias)?;
            shape = layer.output_shape(&shape)?;
            layers.push(layer);
        }
        Ok(layers)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn weights(&self) -> &WeightBlob {
        &self.weights
    }

    pub fn input_shape(&self) -> Shape {
        self.topology.input_shape()
    }

    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    pub fn format(&self) -> NumberFormat {
        self.topology.format
    }
}
