//! Pipeline: a fixed chain of layers over two reusable activation buffers.
//!
//! ```text
//! input → Layer[0] → front → Layer[1] → back → Layer[2] → front → ... → Layer[N-1] → output
//! ```
//!
//! The first layer reads the caller's input and the last layer writes the
//! caller's output; everything in between ping-pongs between the two slots.
//! Each layer only reads the output of the layer right before it, so
//! overwriting the slot it does not read is always safe.
//!
//! Shapes are validated and both slots are sized when the pipeline is built;
//! an inference call allocates nothing.

use crate::arena::{Arena, BufferPlan, DoubleBuffer};
use crate::error::{CnnError, CnnResult};
use crate::layers::{Layer, Shape};
use crate::math::{self, NumberFormat, Sample};

/// Where a layer reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Input,
    Front,
    Back,
}

/// Where a layer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Front,
    Back,
    Output,
}

/// One scheduled layer invocation.
#[derive(Debug, Clone, Copy)]
struct Step {
    index: usize,
    input_shape: Shape,
    output_shape: Shape,
    src: Source,
    dst: Target,
}

/// Walk the layer chain, assigning every layer a source and destination slot.
///
/// The last layer writes the output. A reshape reading a slot stays in it.
/// Everything else writes the slot it does not read.
fn schedule<F>(layers: &[&dyn Layer], input_shape: Shape, mut visit: F) -> CnnResult<Shape>
where
    F: FnMut(&dyn Layer, &Step) -> CnnResult<()>,
{
    let last = layers.len().checked_sub(1).ok_or(CnnError::EmptyPipeline)?;
    input_shape
        .checked_total()
        .ok_or(CnnError::SizeOverflow { what: "input shape" })?;
    let mut shape = input_shape;
    let mut src = Source::Input;

    for (index, layer) in layers.iter().enumerate() {
        let output_shape = layer.output_shape(&shape)?;
        let dst = match src {
            _ if index == last => Target::Output,
            Source::Front if layer.is_reshape() => Target::Front,
            Source::Back if layer.is_reshape() => Target::Back,
            Source::Front => Target::Back,
            Source::Input | Source::Back => Target::Front,
        };

        visit(*layer, &Step { index, input_shape: shape, output_shape, src, dst })?;
        shape = output_shape;
        src = match dst {
            Target::Front => Source::Front,
            Target::Back => Source::Back,
            Target::Output => src,
        };
    }
    Ok(shape)
}

/// A validated, immutable layer chain.
///
/// # Lifetime `'m`
/// The pipeline borrows its layers, and the layers borrow their weights. On
/// an MCU both are typically `static`.
///
/// Not reentrant per buffer set: two overlapping calls need two `DoubleBuffer`s
/// (or two arenas). The pipeline itself holds no mutable state.
pub struct Pipeline<'m> {
    layers: &'m [&'m dyn Layer],
    input_shape: Shape,
    output_shape: Shape,
    format: NumberFormat,
    plan: BufferPlan,
}

impl<'m> Pipeline<'m> {
    /// Validate the chain and size both activation slots.
    ///
    /// Fails on an empty chain or on the first layer that rejects the shape
    /// produced by its predecessor.
    pub fn new(layers: &'m [&'m dyn Layer], input_shape: Shape, format: NumberFormat) -> CnnResult<Self> {
        let mut plan = BufferPlan::default();
        let output_shape = schedule(layers, input_shape, |_, step| {
            let len = step.output_shape.total();
            match step.dst {
                Target::Front => plan.front = plan.front.max(len),
                Target::Back => plan.back = plan.back.max(len),
                Target::Output => {}
            }
            Ok(())
        })?;

        tracing::debug!(
            layers = layers.len(),
            front = plan.front,
            back = plan.back,
            frac_bits = format.frac_bits(),
            "pipeline validated"
        );

        Ok(Self { layers, input_shape, output_shape, format, plan })
    }

    /// Run one inference, taking both activation slots from `arena`.
    ///
    /// The slots are released again before returning, whatever the outcome.
    pub fn run(&self, input: &[Sample], output: &mut [Sample], arena: &mut Arena<'_>) -> CnnResult<()> {
        let checkpoint = arena.save_checkpoint();
        let result = arena
            .alloc_pair(self.plan.front, self.plan.back)
            .and_then(|(front, back)| self.run_with_buffers(input, output, &mut DoubleBuffer::new(front, back)));
        arena.restore_checkpoint(checkpoint);
        result
    }

    /// Run one inference over caller-owned activation slots.
    pub fn run_with_buffers(
        &self,
        input: &[Sample],
        output: &mut [Sample],
        buffers: &mut DoubleBuffer<'_>,
    ) -> CnnResult<()> {
        if input.len() != self.input_shape.total() {
            return Err(CnnError::DimensionMismatch { expected: self.input_shape.total(), actual: input.len() });
        }
        if output.len() != self.output_shape.total() {
            return Err(CnnError::DimensionMismatch { expected: self.output_shape.total(), actual: output.len() });
        }
        buffers.check(&self.plan)?;

        let format = self.format;
        let (front, back) = buffers.split();

        schedule(self.layers, self.input_shape, |layer, step| {
            let in_len = step.input_shape.total();
            let out_len = step.output_shape.total();
            let shape = &step.input_shape;

            match (step.src, step.dst) {
                (Source::Front, Target::Front) | (Source::Back, Target::Back) => {
                    tracing::trace!(index = step.index, layer = layer.name(), "elided");
                    return Ok(());
                }
                (Source::Input, Target::Output) => layer.forward(input, shape, output, format),
                (Source::Input, Target::Front) => layer.forward(input, shape, &mut front[..out_len], format),
                (Source::Input, Target::Back) => layer.forward(input, shape, &mut back[..out_len], format),
                (Source::Front, Target::Back) => layer.forward(&front[..in_len], shape, &mut back[..out_len], format),
                (Source::Back, Target::Front) => layer.forward(&back[..in_len], shape, &mut front[..out_len], format),
                (Source::Front, Target::Output) => layer.forward(&front[..in_len], shape, output, format),
                (Source::Back, Target::Output) => layer.forward(&back[..in_len], shape, output, format),
            }?;

            tracing::trace!(
                index = step.index,
                layer = layer.name(),
                channels = step.output_shape.channels(),
                length = step.output_shape.length(),
                "layer done"
            );
            Ok(())
        })?;
        Ok(())
    }

    /// Run, then return the index of the largest output (the predicted class).
    pub fn predict(&self, input: &[Sample], output: &mut [Sample], arena: &mut Arena<'_>) -> CnnResult<usize> {
        self.run(input, output, arena)?;
        math::argmax(output)
    }

    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    pub fn format(&self) -> NumberFormat {
        self.format
    }

    /// Sample capacity each activation slot needs.
    pub fn buffer_plan(&self) -> BufferPlan {
        self.plan
    }

    /// Minimum arena capacity (in samples) for `run`.
    pub fn arena_size(&self) -> usize {
        self.plan.total()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, idx: usize) -> Option<&dyn Layer> {
        self.layers.get(idx).copied()
    }
}
