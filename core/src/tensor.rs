//! Fixed-size sample storage with compile-time element count.
//!
//! `Tensor<N>` is a plain `[Sample; N]`; `ActivationStore` pairs two of them
//! so a model whose buffer plan is known at build time can run from static
//! memory without an arena.

use crate::arena::DoubleBuffer;
use crate::error::{CnnError, CnnResult};
use crate::math::Sample;

/// A fixed-size tensor of samples.
///
/// Shape semantics (channels × length) are tracked by the caller; the
/// storage is the flat channel-major layout every layer expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor<const N: usize> {
    data: [Sample; N],
}

impl<const N: usize> Tensor<N> {
    pub const fn zeros() -> Self {
        Self { data: [0; N] }
    }

    /// Returns an error if `slice.len() != N`.
    pub fn from_slice(slice: &[Sample]) -> CnnResult<Self> {
        if slice.len() != N {
            return Err(CnnError::DimensionMismatch { expected: N, actual: slice.len() });
        }
        let mut data = [0; N];
        data.copy_from_slice(slice);
        Ok(Self { data })
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> Option<Sample> {
        self.data.get(index).copied()
    }

    #[inline(always)]
    pub fn set(&mut self, index: usize, value: Sample) -> CnnResult<()> {
        let slot = self
            .data
            .get_mut(index)
            .ok_or(CnnError::DimensionMismatch { expected: N, actual: index })?;
        *slot = value;
        Ok(())
    }

    pub fn fill(&mut self, value: Sample) {
        self.data.fill(value);
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[Sample] {
        &self.data
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    #[inline(always)]
    pub const fn len(&self) -> usize {
        N
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for Tensor<N> {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Statically sized front/back activation slots.
///
/// Size `FRONT` and `BACK` from `Pipeline::buffer_plan()`; a smaller store is
/// rejected by the pipeline before any layer runs.
#[derive(Debug, Clone)]
pub struct ActivationStore<const FRONT: usize, const BACK: usize> {
    front: Tensor<FRONT>,
    back: Tensor<BACK>,
}

impl<const FRONT: usize, const BACK: usize> ActivationStore<FRONT, BACK> {
    pub const fn new() -> Self {
        Self { front: Tensor::zeros(), back: Tensor::zeros() }
    }

    pub fn buffers(&mut self) -> DoubleBuffer<'_> {
        DoubleBuffer::new(self.front.as_mut_slice(), self.back.as_mut_slice())
    }
}

impl<const FRONT: usize, const BACK: usize> Default for ActivationStore<FRONT, BACK> {
    fn default() -> Self {
        Self::new()
    }
}
