//! Sample arena and the two-slot activation buffer.
//!
//! MCUs have no heap allocator. The caller owns a `[Sample; N]` (static or on
//! the stack) and lends it to the arena, which hands out sub-slices with O(1)
//! bump allocation. A pipeline needs exactly two slots at a time, the
//! "front" and "back" activation buffers, and gives them back through a
//! checkpoint when the inference call returns.

use crate::error::{CnnError, CnnResult};
use crate::math::Sample;

/// Bump allocator over a borrowed sample buffer.
///
/// Slices handed out borrow the arena mutably, so the borrow checker keeps
/// them from outliving a `restore_checkpoint` or `reset`.
pub struct Arena<'a> {
    buf: &'a mut [Sample],
    offset: usize,
}

impl<'a> Arena<'a> {
    pub fn new(buf: &'a mut [Sample]) -> Self {
        Self { buf, offset: 0 }
    }

    fn reserve(&mut self, len: usize) -> CnnResult<usize> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(CnnError::ArenaExhausted { requested: len, remaining });
        }
        let start = self.offset;
        self.offset += len;
        Ok(start)
    }

    /// Allocate a zeroed slice of `len` samples.
    pub fn alloc_samples(&mut self, len: usize) -> CnnResult<&mut [Sample]> {
        let start = self.reserve(len)?;
        let slice = &mut self.buf[start..start + len];
        slice.fill(0);
        Ok(slice)
    }

    /// Allocate two disjoint zeroed slices in one go.
    pub fn alloc_pair(&mut self, first: usize, second: usize) -> CnnResult<(&mut [Sample], &mut [Sample])> {
        let start = self.reserve(first + second)?;
        let region = &mut self.buf[start..start + first + second];
        region.fill(0);
        Ok(region.split_at_mut(first))
    }

    #[inline(always)]
    pub fn save_checkpoint(&self) -> usize {
        self.offset
    }

    /// Release everything allocated after `checkpoint`.
    #[inline(always)]
    pub fn restore_checkpoint(&mut self, checkpoint: usize) {
        if checkpoint <= self.offset {
            self.offset = checkpoint;
        }
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    /// Total capacity in samples.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline(always)]
    pub fn used(&self) -> usize {
        self.offset
    }
}

/// Sample capacities a pipeline needs in each activation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferPlan {
    pub front: usize,
    pub back: usize,
}

impl BufferPlan {
    pub fn total(&self) -> usize {
        self.front + self.back
    }
}

/// The two alternating activation slots.
///
/// Layers that write the front slot read the back one and vice versa, so a
/// layer never reads the buffer it is producing into.
pub struct DoubleBuffer<'b> {
    front: &'b mut [Sample],
    back: &'b mut [Sample],
}

impl<'b> DoubleBuffer<'b> {
    pub fn new(front: &'b mut [Sample], back: &'b mut [Sample]) -> Self {
        Self { front, back }
    }

    pub fn front_len(&self) -> usize {
        self.front.len()
    }

    pub fn back_len(&self) -> usize {
        self.back.len()
    }

    pub fn check(&self, plan: &BufferPlan) -> CnnResult<()> {
        for (required, available) in [(plan.front, self.front.len()), (plan.back, self.back.len())] {
            if available < required {
                return Err(CnnError::BufferTooSmall { required, available });
            }
        }
        Ok(())
    }

    pub fn split(&mut self) -> (&mut [Sample], &mut [Sample]) {
        (&mut *self.front, &mut *self.back)
    }

    pub fn front(&self) -> &[Sample] {
        &self.front[..]
    }

    pub fn back(&self) -> &[Sample] {
        &self.back[..]
    }
}
