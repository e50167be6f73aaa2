//! Fixed-point arithmetic and the 1-D layer kernels.
//!
//! Samples are stored as `i16` in Q7.9 (9 fractional bits, real value =
//! `raw / 512`). Every reduction (dot product, window sum) runs in an `i32`
//! accumulator and is narrowed back exactly once, when the result is written
//! to an activation buffer.
//!
//! Rounding: the rescale after a dot product is an arithmetic right shift,
//! which floors toward negative infinity. Average pooling divides with Rust's
//! `/`, which truncates toward zero.

use crate::error::{CnnError, CnnResult};
use crate::layers::activations::Activation;
use crate::layers::{LayerKind, Shape};

/// Storage type for weights and activations.
pub type Sample = i16;

/// Wide type for partial sums. Never persisted between layers.
pub type Accumulator = i32;

pub const SAMPLE_MIN: Accumulator = Sample::MIN as Accumulator;
pub const SAMPLE_MAX: Accumulator = Sample::MAX as Accumulator;

/// Fractional bits used by every shipped model snapshot.
pub const FIXED_POINT: u32 = 9;

// =============================================================================
// Number format
// =============================================================================

/// Numeric configuration shared by every layer of a pipeline.
///
/// `frac_bits > 0` selects fixed point: rescale by shifting and saturate into
/// the `i16` range. `frac_bits == 0` is the pass-through mode used when the
/// weights are not scaled: rescaling is the identity and narrowing is a plain cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "FormatRepr", into = "FormatRepr")
)]
pub struct NumberFormat {
    frac_bits: u32,
}

impl NumberFormat {
    /// Q7.9, the format of all observed model snapshots.
    pub const Q7_9: Self = Self { frac_bits: FIXED_POINT };

    /// No scaling, no clamping.
    pub const PASSTHROUGH: Self = Self { frac_bits: 0 };

    pub const fn new(frac_bits: u32) -> CnnResult<Self> {
        if frac_bits >= Sample::BITS {
            return Err(CnnError::InvalidFormat { frac_bits });
        }
        Ok(Self { frac_bits })
    }

    #[inline(always)]
    pub const fn frac_bits(self) -> u32 {
        self.frac_bits
    }

    #[inline(always)]
    pub const fn is_fixed_point(self) -> bool {
        self.frac_bits > 0
    }

    /// Rescale a finished dot product back to sample precision.
    ///
    /// Arithmetic shift: floors toward negative infinity (`-1 >> 9 == -1`).
    /// A zero shift is the identity.
    #[inline(always)]
    pub const fn scale_down(self, acc: Accumulator) -> Accumulator {
        acc >> self.frac_bits
    }

    /// Narrow an accumulator to a sample, clamping to `[SAMPLE_MIN, SAMPLE_MAX]`.
    #[inline(always)]
    pub const fn saturate(self, acc: Accumulator) -> Sample {
        if self.frac_bits == 0 {
            return acc as Sample;
        }
        if acc < SAMPLE_MIN {
            Sample::MIN
        } else if acc > SAMPLE_MAX {
            Sample::MAX
        } else {
            acc as Sample
        }
    }

    /// Convert a real value to the nearest representable sample.
    #[cfg(feature = "std")]
    pub fn quantize(self, value: f32) -> Sample {
        let scaled = (value * (1u32 << self.frac_bits) as f32).round();
        self.saturate(scaled as Accumulator)
    }

    #[cfg(feature = "std")]
    pub fn dequantize(self, sample: Sample) -> f32 {
        sample as f32 / (1u32 << self.frac_bits) as f32
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::Q7_9
    }
}

#[cfg(feature = "std")]
#[derive(serde::Serialize, serde::Deserialize)]
struct FormatRepr {
    frac_bits: u32,
}

#[cfg(feature = "std")]
impl TryFrom<FormatRepr> for NumberFormat {
    type Error = CnnError;

    fn try_from(repr: FormatRepr) -> CnnResult<Self> {
        Self::new(repr.frac_bits)
    }
}

#[cfg(feature = "std")]
impl From<NumberFormat> for FormatRepr {
    fn from(format: NumberFormat) -> Self {
        Self { frac_bits: format.frac_bits }
    }
}

// =============================================================================
// Shape algebra
// =============================================================================

/// `a * b`, or `SizeOverflow` naming `what`.
pub fn checked_size(a: usize, b: usize, what: &'static str) -> CnnResult<usize> {
    a.checked_mul(b).ok_or(CnnError::SizeOverflow { what })
}

/// Output length of a strided window over a (virtually padded) sequence:
/// `floor((length + pad_left + pad_right - window) / stride) + 1`.
///
/// `None` when the window does not fit at least once, for a zero stride/window,
/// or when the padded length overflows.
pub fn window_output_len(
    length: usize,
    window: usize,
    stride: usize,
    pad_left: usize,
    pad_right: usize,
) -> Option<usize> {
    let padded = length.checked_add(pad_left)?.checked_add(pad_right)?;
    if stride == 0 || window == 0 || window > padded {
        return None;
    }
    Some((padded - window) / stride + 1)
}

/// Geometry of a 1-D convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv1dParams {
    pub in_channels: usize,
    pub filters: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub pad_left: usize,
    pub pad_right: usize,
    pub activation: Activation,
}

impl Conv1dParams {
    pub fn validate(&self) -> CnnResult<()> {
        let layer = LayerKind::Conv;
        if self.stride == 0 {
            return Err(CnnError::ZeroStride { layer });
        }
        for (what, value) in [
            ("in_channels", self.in_channels),
            ("filters", self.filters),
            ("kernel_size", self.kernel_size),
        ] {
            if value == 0 {
                return Err(CnnError::ZeroDimension { layer, what });
            }
        }
        self.kernel_len()?;
        Ok(())
    }

    pub fn output_len(&self, in_len: usize) -> CnnResult<usize> {
        let padded = in_len
            .checked_add(self.pad_left)
            .and_then(|len| len.checked_add(self.pad_right))
            .ok_or(CnnError::SizeOverflow { what: "padded conv input" })?;
        window_output_len(padded, self.kernel_size, self.stride, 0, 0).ok_or(CnnError::EmptyOutput {
            layer: LayerKind::Conv,
            window: self.kernel_size,
            input: padded,
        })
    }

    /// `[in_channels, L]` → `[filters, L']`.
    pub fn output_shape(&self, input: &Shape) -> CnnResult<Shape> {
        if input.is_flat() || input.channels() != self.in_channels {
            return Err(CnnError::ShapeMismatch {
                layer: LayerKind::Conv,
                channels: input.channels(),
                length: input.length(),
            });
        }
        let out_len = self.output_len(input.length())?;
        checked_size(self.filters, out_len, "conv output")?;
        Ok(Shape::d2(self.filters, out_len))
    }

    /// `filters * in_channels * kernel_size`.
    pub fn kernel_len(&self) -> CnnResult<usize> {
        checked_size(
            checked_size(self.filters, self.in_channels, "conv kernel")?,
            self.kernel_size,
            "conv kernel",
        )
    }
}

/// Geometry of a 1-D pooling window. Padding is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool1dParams {
    pub pool_size: usize,
    pub stride: usize,
    /// Floor the window result at zero. Unused by every shipped snapshot.
    pub relu: bool,
}

impl Pool1dParams {
    /// Rejects nonzero padding, a zero window and a zero stride.
    pub fn new(layer: LayerKind, pool_size: usize, stride: usize, padding: usize) -> CnnResult<Self> {
        if padding != 0 {
            return Err(CnnError::UnsupportedPadding { layer, padding });
        }
        let params = Self { pool_size, stride, relu: false };
        params.validate(layer)?;
        Ok(params)
    }

    pub fn validate(&self, layer: LayerKind) -> CnnResult<()> {
        if self.stride == 0 {
            return Err(CnnError::ZeroStride { layer });
        }
        if self.pool_size == 0 {
            return Err(CnnError::ZeroDimension { layer, what: "pool_size" });
        }
        Ok(())
    }

    pub fn output_len(&self, layer: LayerKind, in_len: usize) -> CnnResult<usize> {
        window_output_len(in_len, self.pool_size, self.stride, 0, 0).ok_or(CnnError::EmptyOutput {
            layer,
            window: self.pool_size,
            input: in_len,
        })
    }

    /// `[C, L]` → `[C, L']`. Never larger than the input.
    pub fn output_shape(&self, layer: LayerKind, input: &Shape) -> CnnResult<Shape> {
        if input.is_flat() {
            return Err(CnnError::ShapeMismatch {
                layer,
                channels: input.channels(),
                length: input.length(),
            });
        }
        let out_len = self.output_len(layer, input.length())?;
        Ok(Shape::d2(input.channels(), out_len))
    }
}

fn check_len(expected: usize, actual: usize) -> CnnResult<()> {
    if expected != actual {
        return Err(CnnError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

// =============================================================================
// Convolution
// =============================================================================

/// Strided 1-D convolution with implicit zero padding.
///
/// Input:  [in_channels × in_len]  (channel-major)
/// Kernel: [filters × in_channels × kernel_size]
/// Bias:   [filters]
/// Output: [filters × out_len]
///
/// Positions that fall into the padding contribute nothing; the valid kernel
/// taps are computed up front so the input is never indexed out of bounds.
pub fn conv1d(
    input: &[Sample],
    kernel: &[Sample],
    bias: &[Sample],
    output: &mut [Sample],
    params: &Conv1dParams,
    in_len: usize,
    format: NumberFormat,
) -> CnnResult<()> {
    params.validate()?;
    let out_len = params.output_len(in_len)?;
    let ks = params.kernel_size;

    check_len(checked_size(params.in_channels, in_len, "conv input")?, input.len())?;
    check_len(params.kernel_len()?, kernel.len())?;
    check_len(params.filters, bias.len())?;
    check_len(checked_size(params.filters, out_len, "conv output")?, output.len())?;

    for (f, out_row) in output.chunks_exact_mut(out_len).enumerate() {
        let filter = &kernel[f * params.in_channels * ks..(f + 1) * params.in_channels * ks];
        let bias_f = bias[f] as Accumulator;

        for (p, out) in out_row.iter_mut().enumerate() {
            // Tap 0 in padded coordinates; the real input spans
            // [pad_left, pad_left + in_len) there.
            let origin = p * params.stride;
            let k_lo = params.pad_left.saturating_sub(origin).min(ks);
            let k_hi = (params.pad_left + in_len).saturating_sub(origin).min(ks);

            let mut acc: Accumulator = 0;
            if k_lo < k_hi {
                let first = origin + k_lo - params.pad_left;
                for (in_row, taps) in input.chunks_exact(in_len).zip(filter.chunks_exact(ks)) {
                    for (&x, &w) in in_row[first..].iter().zip(&taps[k_lo..k_hi]) {
                        acc = acc.wrapping_add(x as Accumulator * w as Accumulator);
                    }
                }
            }

            let acc = format.scale_down(acc).wrapping_add(bias_f);
            *out = params.activation.apply(acc, format);
        }
    }
    Ok(())
}

// =============================================================================
// Pooling
// =============================================================================

/// Max pooling over [channels × in_len] → [channels × out_len].
///
/// Exact in the sample domain: no widening, no clamping.
pub fn max_pool1d(
    input: &[Sample],
    output: &mut [Sample],
    channels: usize,
    in_len: usize,
    params: &Pool1dParams,
) -> CnnResult<()> {
    params.validate(LayerKind::MaxPool)?;
    let out_len = params.output_len(LayerKind::MaxPool, in_len)?;
    check_len(checked_size(channels, in_len, "pool input")?, input.len())?;
    check_len(checked_size(channels, out_len, "pool output")?, output.len())?;

    for (in_row, out_row) in input.chunks_exact(in_len).zip(output.chunks_exact_mut(out_len)) {
        for (p, out) in out_row.iter_mut().enumerate() {
            let window = &in_row[p * params.stride..p * params.stride + params.pool_size];
            let init = if params.relu { 0 } else { window[0] };
            *out = window.iter().fold(init, |max, &v| if v > max { v } else { max });
        }
    }
    Ok(())
}

/// Average pooling over [channels × in_len] → [channels × out_len].
///
/// Plain sum (no rescale), optional floor at zero, truncating division by
/// the window size, then saturation.
pub fn avg_pool1d(
    input: &[Sample],
    output: &mut [Sample],
    channels: usize,
    in_len: usize,
    params: &Pool1dParams,
    format: NumberFormat,
) -> CnnResult<()> {
    params.validate(LayerKind::AvgPool)?;
    let out_len = params.output_len(LayerKind::AvgPool, in_len)?;
    check_len(checked_size(channels, in_len, "pool input")?, input.len())?;
    check_len(checked_size(channels, out_len, "pool output")?, output.len())?;

    let divisor = params.pool_size as Accumulator;
    for (in_row, out_row) in input.chunks_exact(in_len).zip(output.chunks_exact_mut(out_len)) {
        for (p, out) in out_row.iter_mut().enumerate() {
            let window = &in_row[p * params.stride..p * params.stride + params.pool_size];
            let mut sum = window
                .iter()
                .fold(0 as Accumulator, |acc, &v| acc.wrapping_add(v as Accumulator));
            if params.relu && sum < 0 {
                sum = 0;
            }
            *out = format.saturate(sum / divisor);
        }
    }
    Ok(())
}

// =============================================================================
// Dense
// =============================================================================

/// Fully connected layer: output[u] = act(scale(Σ input[i]·kernel[u][i]) + bias[u]).
pub fn dense(
    input: &[Sample],
    kernel: &[Sample],
    bias: &[Sample],
    output: &mut [Sample],
    activation: Activation,
    format: NumberFormat,
) -> CnnResult<()> {
    let units = bias.len();
    check_len(units, output.len())?;
    check_len(checked_size(units, input.len(), "dense kernel")?, kernel.len())?;
    if input.is_empty() {
        return Err(CnnError::ZeroDimension {
            layer: LayerKind::Dense,
            what: "input length",
        });
    }

    for ((row, &b), out) in kernel.chunks_exact(input.len()).zip(bias).zip(output.iter_mut()) {
        let acc = row
            .iter()
            .zip(input)
            .fold(0 as Accumulator, |acc, (&w, &x)| {
                acc.wrapping_add(w as Accumulator * x as Accumulator)
            });
        let acc = format.scale_down(acc).wrapping_add(b as Accumulator);
        *out = activation.apply(acc, format);
    }
    Ok(())
}

// =============================================================================
// Classification helpers
// =============================================================================

/// Index of the largest sample. Ties go to the lowest index.
pub fn argmax(data: &[Sample]) -> CnnResult<usize> {
    let mut iter = data.iter().enumerate();
    let (mut best_idx, mut best) = iter.next().ok_or(CnnError::EmptyInput)?;
    for (i, v) in iter {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    Ok(best_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_down_floors_negative_values() {
        let q = NumberFormat::Q7_9;
        assert_eq!(q.scale_down(1023), 1);
        assert_eq!(q.scale_down(-1), -1);
        assert_eq!(q.scale_down(-512), -1);
        assert_eq!(q.scale_down(-513), -2);
    }

    #[test]
    fn zero_shift_is_identity() {
        let f = NumberFormat::PASSTHROUGH;
        assert_eq!(f.scale_down(-12345), -12345);
        assert_eq!(f.scale_down(i32::MIN), i32::MIN);
        assert!(!f.is_fixed_point());
        assert!(NumberFormat::Q7_9.is_fixed_point());
    }

    #[test]
    fn saturate_clamps_closed_interval() {
        let q = NumberFormat::Q7_9;
        assert_eq!(q.saturate(32767), i16::MAX);
        assert_eq!(q.saturate(32768), i16::MAX);
        assert_eq!(q.saturate(-32768), i16::MIN);
        assert_eq!(q.saturate(-40000), i16::MIN);
        assert_eq!(q.saturate(-7), -7);
    }

    #[test]
    fn passthrough_saturate_is_a_narrowing_cast() {
        assert_eq!(NumberFormat::PASSTHROUGH.saturate(32768), i16::MIN);
        assert_eq!(NumberFormat::PASSTHROUGH.saturate(70000), 70000i32 as i16);
    }

    #[test]
    fn format_rejects_too_many_fraction_bits() {
        assert!(NumberFormat::new(15).is_ok());
        assert_eq!(
            NumberFormat::new(16),
            Err(CnnError::InvalidFormat { frac_bits: 16 })
        );
    }

    #[test]
    fn window_output_len_follows_floor_law() {
        assert_eq!(window_output_len(16000, 20, 10, 0, 0), Some(1599));
        assert_eq!(window_output_len(1599, 2, 2, 0, 0), Some(799));
        assert_eq!(window_output_len(3, 4, 2, 0, 0), None);
        assert_eq!(window_output_len(3, 4, 2, 1, 0), Some(1));
        assert_eq!(window_output_len(8, 2, 0, 0, 0), None);
    }

    #[test]
    fn oversized_geometry_is_an_error() {
        assert_eq!(window_output_len(usize::MAX, 1, 1, 1, 0), None);
        assert_eq!(window_output_len(8, 1, 1, usize::MAX, usize::MAX), None);

        let params = Conv1dParams {
            in_channels: 1,
            filters: 1,
            kernel_size: 2,
            stride: 1,
            pad_left: usize::MAX,
            pad_right: 0,
            activation: Activation::Linear,
        };
        assert_eq!(params.output_len(8), Err(CnnError::SizeOverflow { what: "padded conv input" }));

        let params = Conv1dParams { pad_left: 0, filters: usize::MAX, in_channels: 2, ..params };
        assert_eq!(params.kernel_len(), Err(CnnError::SizeOverflow { what: "conv kernel" }));
        assert_eq!(params.validate(), Err(CnnError::SizeOverflow { what: "conv kernel" }));
        assert_eq!(checked_size(usize::MAX, 1, "x"), Ok(usize::MAX));
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[3, 9, 9, -1]), Ok(1));
        assert_eq!(argmax(&[]), Err(CnnError::EmptyInput));
    }
}
