//! Python bindings for fixcnn-core via PyO3.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use fixcnn_core::{
    Activation, Arena, AvgPool1DLayer, CnnError, Conv1DLayer, Conv1dParams, DenseLayer, FlattenLayer, Layer,
    LoadError, MaxPool1DLayer, ModelBundle, NumberFormat, Pipeline, Shape,
};

fn to_py_err(e: CnnError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn load_err(e: LoadError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_activation(name: &str) -> PyResult<Activation> {
    match name {
        "linear" => Ok(Activation::Linear),
        "relu" => Ok(Activation::Relu),
        other => Err(PyValueError::new_err(format!("unknown activation {other:?}"))),
    }
}

fn leak(values: Vec<i16>) -> &'static [i16] {
    Box::leak(values.into_boxed_slice())
}

/// A fixed-point 1-D CNN, built layer by layer or loaded from disk.
#[pyclass]
pub struct PyPipeline {
    input_shape: Shape,
    format: NumberFormat,
    layers: Vec<Box<dyn Layer>>,
}

impl PyPipeline {
    fn current_shape(&self) -> PyResult<Shape> {
        let mut shape = self.input_shape;
        for layer in self.layers.iter() {
            shape = layer.output_shape(&shape).map_err(to_py_err)?;
        }
        Ok(shape)
    }

    fn push(&mut self, layer: Box<dyn Layer>) -> PyResult<()> {
        let shape = self.current_shape()?;
        layer.output_shape(&shape).map_err(to_py_err)?;
        self.layers.push(layer);
        Ok(())
    }

    fn with_pipeline<T>(&self, f: impl FnOnce(&Pipeline<'_>) -> PyResult<T>) -> PyResult<T> {
        let refs: Vec<&dyn Layer> = self.layers.iter().map(|l| l.as_ref() as &dyn Layer).collect();
        let pipeline = Pipeline::new(&refs, self.input_shape, self.format).map_err(to_py_err)?;
        f(&pipeline)
    }
}

#[pymethods]
impl PyPipeline {
    #[new]
    #[pyo3(signature = (input_channels, input_length, frac_bits = 9))]
    fn new(input_channels: usize, input_length: usize, frac_bits: u32) -> PyResult<Self> {
        let format = NumberFormat::new(frac_bits).map_err(to_py_err)?;
        Ok(Self { input_shape: Shape::d2(input_channels, input_length), format, layers: Vec::new() })
    }

    /// Build from a topology JSON file and a little-endian i16 weight blob.
    #[staticmethod]
    fn load(topology_path: &str, weights_path: &str) -> PyResult<Self> {
        let bundle = ModelBundle::from_files(topology_path, weights_path).map_err(load_err)?;
        let bundle: &'static ModelBundle = Box::leak(Box::new(bundle));
        let layers = bundle.layers().map_err(to_py_err)?;
        Ok(Self { input_shape: bundle.input_shape(), format: bundle.format(), layers })
    }

    #[pyo3(signature = (kernel, bias, kernel_size, stride = 1, pad_left = 0, pad_right = 0, activation = "linear"))]
    fn add_conv1d(
        &mut self,
        kernel: Vec<i16>,
        bias: Vec<i16>,
        kernel_size: usize,
        stride: usize,
        pad_left: usize,
        pad_right: usize,
        activation: &str,
    ) -> PyResult<()> {
        let in_channels = self.current_shape()?.channels();
        let params = Conv1dParams {
            in_channels,
            filters: bias.len(),
            kernel_size,
            stride,
            pad_left,
            pad_right,
            activation: parse_activation(activation)?,
        };
        let layer = Conv1DLayer::with_params(leak(kernel), leak(bias), params).map_err(to_py_err)?;
        self.push(Box::new(layer))
    }

    #[pyo3(signature = (pool_size, stride = None, relu = false))]
    fn add_max_pool1d(&mut self, pool_size: usize, stride: Option<usize>, relu: bool) -> PyResult<()> {
        let layer = MaxPool1DLayer::new(pool_size, stride.unwrap_or(pool_size), 0).map_err(to_py_err)?;
        self.push(Box::new(layer.with_relu(relu)))
    }

    #[pyo3(signature = (pool_size, stride = None, relu = false))]
    fn add_avg_pool1d(&mut self, pool_size: usize, stride: Option<usize>, relu: bool) -> PyResult<()> {
        let layer = AvgPool1DLayer::new(pool_size, stride.unwrap_or(pool_size), 0).map_err(to_py_err)?;
        self.push(Box::new(layer.with_relu(relu)))
    }

    fn add_flatten(&mut self) -> PyResult<()> {
        self.push(Box::new(FlattenLayer))
    }

    #[pyo3(signature = (weights, bias, activation = "linear"))]
    fn add_dense(&mut self, weights: Vec<i16>, bias: Vec<i16>, activation: &str) -> PyResult<()> {
        let in_features = self.current_shape()?.total();
        let units = bias.len();
        let layer = DenseLayer::new(leak(weights), leak(bias), in_features, units, parse_activation(activation)?)
            .map_err(to_py_err)?;
        self.push(Box::new(layer))
    }

    fn forward(&self, input: Vec<i16>) -> PyResult<Vec<i16>> {
        self.with_pipeline(|pipeline| {
            let mut scratch = vec![0i16; pipeline.arena_size()];
            let mut arena = Arena::new(&mut scratch);
            let mut output = vec![0i16; pipeline.output_shape().total()];
            pipeline.run(&input, &mut output, &mut arena).map_err(to_py_err)?;
            Ok(output)
        })
    }

    fn predict(&self, input: Vec<i16>) -> PyResult<usize> {
        self.with_pipeline(|pipeline| {
            let mut scratch = vec![0i16; pipeline.arena_size()];
            let mut arena = Arena::new(&mut scratch);
            let mut output = vec![0i16; pipeline.output_shape().total()];
            pipeline.predict(&input, &mut output, &mut arena).map_err(to_py_err)
        })
    }

    fn quantize(&self, values: Vec<f32>) -> Vec<i16> {
        values.into_iter().map(|v| self.format.quantize(v)).collect()
    }

    fn dequantize(&self, samples: Vec<i16>) -> Vec<f32> {
        samples.into_iter().map(|s| self.format.dequantize(s)).collect()
    }

    fn output_shape(&self) -> PyResult<Vec<usize>> {
        let shape = self.current_shape()?;
        Ok(shape.dims[..shape.ndim].to_vec())
    }

    /// (front, back) activation slot sizes in samples.
    fn buffer_plan(&self) -> PyResult<(usize, usize)> {
        self.with_pipeline(|pipeline| {
            let plan = pipeline.buffer_plan();
            Ok((plan.front, plan.back))
        })
    }

    fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name().to_string()).collect()
    }
}

#[pymodule]
fn fixcnn_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPipeline>()?;
    Ok(())
}
