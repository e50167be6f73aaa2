//! General-purpose integration tests for the 1-D fixed-point engine.
//!
//! Covers shape propagation, the arena, each kernel in both number formats,
//! layer construction errors, and the double-buffered pipeline.

use fixcnn_core::*;

const PT: NumberFormat = NumberFormat::PASSTHROUGH;
const Q: NumberFormat = NumberFormat::Q7_9;

// =============================================================================
// Shape Tests
// =============================================================================

#[test]
fn test_shape_creation_and_total() {
    let s1 = Shape::d1(10);
    assert_eq!(s1.total(), 10);
    assert_eq!(s1.ndim, 1);
    assert!(s1.is_flat());
    assert_eq!(s1.channels(), 1);
    assert_eq!(s1.length(), 10);

    let s2 = Shape::d2(3, 4);
    assert_eq!(s2.total(), 12);
    assert_eq!(s2.channels(), 3);
    assert_eq!(s2.length(), 4);
    assert!(!s2.is_flat());

    let huge = Shape::d2(usize::MAX, 2);
    assert_eq!(huge.checked_total(), None);
    assert_eq!(huge.total(), usize::MAX);
}

#[test]
fn test_conv_and_pool_output_lengths() {
    // GSC front end: 16000 -> conv(20, 10) -> 1599 -> pool(2) -> 799
    assert_eq!(window_output_len(16000, 20, 10, 0, 0), Some(1599));
    assert_eq!(window_output_len(1599, 2, 2, 0, 0), Some(799));
    assert_eq!(window_output_len(23, 4, 4, 0, 0), Some(5));
    assert_eq!(window_output_len(5, 3, 1, 1, 1), Some(5));
}

// =============================================================================
// Arena Tests (with checkpoints)
// =============================================================================

#[test]
fn test_arena_basic_allocation() {
    let mut buf = [0i16; 256];
    let mut arena = Arena::new(&mut buf);
    let slice = arena.alloc_samples(10).unwrap();
    assert_eq!(slice.len(), 10);
    assert_eq!(arena.used(), 10);
    assert_eq!(arena.remaining(), 246);
    assert_eq!(arena.capacity(), 256);
}

#[test]
fn test_arena_checkpoint_restore() {
    let mut buf = [0i16; 256];
    let mut arena = Arena::new(&mut buf);

    let _output = arena.alloc_samples(10).unwrap();
    let cp = arena.save_checkpoint();

    let _scratch = arena.alloc_samples(100).unwrap();
    assert_eq!(arena.used(), 110);

    arena.restore_checkpoint(cp);
    assert_eq!(arena.used(), 10);
    assert_eq!(arena.remaining(), 246);

    arena.reset();
    assert_eq!(arena.used(), 0);
}

#[test]
fn test_arena_exhaustion_returns_error() {
    let mut buf = [0i16; 16];
    let mut arena = Arena::new(&mut buf);
    assert_eq!(
        arena.alloc_samples(100).unwrap_err(),
        CnnError::ArenaExhausted { requested: 100, remaining: 16 }
    );
}

// =============================================================================
// Conv1D Kernel Tests
// =============================================================================

fn conv_params(in_channels: usize, filters: usize, kernel_size: usize, stride: usize) -> Conv1dParams {
    Conv1dParams {
        in_channels,
        filters,
        kernel_size,
        stride,
        pad_left: 0,
        pad_right: 0,
        activation: Activation::Linear,
    }
}

#[test]
fn test_conv1d_difference_filter() {
    let input = [1, 2, 3, 4, 5];
    let mut out = [0i16; 3];
    conv1d(&input, &[1, 0, -1], &[0], &mut out, &conv_params(1, 1, 3, 1), 5, PT).unwrap();
    assert_eq!(out, [-2, -2, -2]);
}

#[test]
fn test_conv1d_stride() {
    let input = [0, 1, 2, 3, 4, 5, 6];
    let mut out = [0i16; 3];
    conv1d(&input, &[1, 1, 1], &[0], &mut out, &conv_params(1, 1, 3, 2), 7, PT).unwrap();
    assert_eq!(out, [3, 9, 15]);
}

#[test]
fn test_conv1d_implicit_zero_padding() {
    let input = [1, 2, 3, 4, 5];
    let params = Conv1dParams { pad_left: 1, pad_right: 1, ..conv_params(1, 1, 3, 1) };
    let mut out = [0i16; 5];
    conv1d(&input, &[1, 1, 1], &[0], &mut out, &params, 5, PT).unwrap();
    assert_eq!(out, [3, 6, 9, 12, 9]);
}

#[test]
fn test_conv1d_multi_channel_with_bias() {
    // ch0 = [1, 2, 3], ch1 = [10, 20, 30]
    let input = [1, 2, 3, 10, 20, 30];
    // filter 0 sums ch0, filter 1 takes the difference on ch1
    let kernel = [1, 1, 0, 0, 0, 0, 1, -1];
    let mut out = [0i16; 4];
    conv1d(&input, &kernel, &[0, 5], &mut out, &conv_params(2, 2, 2, 1), 3, PT).unwrap();
    assert_eq!(out, [3, 5, -5, -5]);
}

#[test]
fn test_conv1d_q7_9_shift_floors() {
    // kernel 1 is 1/512 in Q7.9
    let input = [512, -1, 1023];
    let mut out = [0i16; 3];
    conv1d(&input, &[1], &[0], &mut out, &conv_params(1, 1, 1, 1), 3, Q).unwrap();
    assert_eq!(out, [1, -1, 1]);

    let relu = Conv1dParams { activation: Activation::Relu, ..conv_params(1, 1, 1, 1) };
    conv1d(&input, &[1], &[0], &mut out, &relu, 3, Q).unwrap();
    assert_eq!(out, [1, 0, 1]);
}

#[test]
fn test_conv1d_bias_added_after_rescale() {
    // 512 * 512 >> 9 = 512, then + bias
    let mut out = [0i16; 1];
    conv1d(&[512], &[512], &[-100], &mut out, &conv_params(1, 1, 1, 1), 1, Q).unwrap();
    assert_eq!(out, [412]);
}

#[test]
fn test_conv1d_saturates() {
    let input = [32767, 32767];
    let mut out = [0i16; 1];
    conv1d(&input, &[32767, 32767], &[0], &mut out, &conv_params(1, 1, 2, 1), 2, Q).unwrap();
    assert_eq!(out, [i16::MAX]);

    conv1d(&input, &[-32768, -32768], &[0], &mut out, &conv_params(1, 1, 2, 1), 2, Q).unwrap();
    assert_eq!(out, [i16::MIN]);

    let relu = Conv1dParams { activation: Activation::Relu, ..conv_params(1, 1, 2, 1) };
    conv1d(&input, &[-32768, -32768], &[0], &mut out, &relu, 2, Q).unwrap();
    assert_eq!(out, [0]);
}

#[test]
fn test_conv1d_rejects_wrong_buffer_lengths() {
    let mut out = [0i16; 2];
    assert_eq!(
        conv1d(&[1, 2, 3], &[1], &[0], &mut out, &conv_params(1, 1, 1, 1), 3, PT),
        Err(CnnError::DimensionMismatch { expected: 3, actual: 2 })
    );
}

// =============================================================================
// Pooling Kernel Tests
// =============================================================================

#[test]
fn test_max_pool_per_channel() {
    let input = [1, 5, 3, 2, 4, -1, -7, -3, -2, -9];
    let params = Pool1dParams { pool_size: 2, stride: 2, relu: false };
    let mut out = [0i16; 4];
    max_pool1d(&input, &mut out, 2, 5, &params).unwrap();
    assert_eq!(out, [5, 3, -1, -2]);

    let relu = Pool1dParams { relu: true, ..params };
    max_pool1d(&input, &mut out, 2, 5, &relu).unwrap();
    assert_eq!(out, [5, 3, 0, 0]);
}

#[test]
fn test_avg_pool_truncates_toward_zero() {
    let input = [-3, 0, 3, 4, 7, 0];
    let params = Pool1dParams { pool_size: 2, stride: 2, relu: false };
    let mut out = [0i16; 3];
    avg_pool1d(&input, &mut out, 1, 6, &params, Q).unwrap();
    // -3 / 2 truncates to -1, not -2
    assert_eq!(out, [-1, 3, 3]);

    let relu = Pool1dParams { relu: true, ..params };
    avg_pool1d(&input, &mut out, 1, 6, &relu, Q).unwrap();
    assert_eq!(out, [0, 3, 3]);
}

#[test]
fn test_avg_pool_wide_sum_does_not_overflow() {
    let input = [i16::MAX; 4];
    let params = Pool1dParams { pool_size: 4, stride: 4, relu: false };
    let mut out = [0i16; 1];
    avg_pool1d(&input, &mut out, 1, 4, &params, Q).unwrap();
    assert_eq!(out, [i16::MAX]);
}

// =============================================================================
// Dense Kernel Tests
// =============================================================================

#[test]
fn test_dense_linear_and_relu() {
    let input = [1, 2, 3];
    let weights = [1, 0, -1, 2, 2, 2];
    let mut out = [0i16; 2];
    dense(&input, &weights, &[10, -20], &mut out, Activation::Linear, PT).unwrap();
    assert_eq!(out, [8, -8]);

    dense(&input, &weights, &[10, -20], &mut out, Activation::Relu, PT).unwrap();
    assert_eq!(out, [8, 0]);
}

#[test]
fn test_dense_q7_9_halves_sum_to_one() {
    // 1.0 * 0.5 + 1.0 * 0.5 = 1.0
    let mut out = [0i16; 1];
    dense(&[512, 512], &[256, 256], &[0], &mut out, Activation::Linear, Q).unwrap();
    assert_eq!(out, [512]);
}

#[test]
fn test_argmax() {
    assert_eq!(argmax(&[270, 583, -1845, 373, -503]), Ok(1));
    assert_eq!(argmax(&[-5, -5, -5]), Ok(0));
    assert_eq!(argmax(&[]), Err(CnnError::EmptyInput));
}

// =============================================================================
// Layer Construction Tests
// =============================================================================

#[test]
fn test_conv_layer_validation() {
    static K: [i16; 4] = [0; 4];
    static B: [i16; 2] = [0; 2];

    assert_eq!(
        Conv1DLayer::new(&K, &B, 1, 2, 2, 0, Activation::Linear).err(),
        Some(CnnError::ZeroStride { layer: LayerKind::Conv })
    );
    assert_eq!(
        Conv1DLayer::new(&K[..3], &B, 1, 2, 2, 1, Activation::Linear).err(),
        Some(CnnError::WeightMismatch { what: "conv kernel", expected: 4, actual: 3 })
    );
    assert_eq!(
        Conv1DLayer::new(&K, &B[..1], 1, 2, 2, 1, Activation::Linear).err(),
        Some(CnnError::WeightMismatch { what: "conv bias", expected: 2, actual: 1 })
    );

    let conv = Conv1DLayer::new(&K, &B, 1, 2, 2, 1, Activation::Relu).unwrap();
    assert_eq!(conv.output_shape(&Shape::d2(1, 10)), Ok(Shape::d2(2, 9)));
    assert_eq!(
        conv.output_shape(&Shape::d2(1, 1)),
        Err(CnnError::EmptyOutput { layer: LayerKind::Conv, window: 2, input: 1 })
    );
    assert_eq!(
        conv.output_shape(&Shape::d2(3, 10)),
        Err(CnnError::ShapeMismatch { layer: LayerKind::Conv, channels: 3, length: 10 })
    );
    assert_eq!(conv.kind(), LayerKind::Conv);
    assert_eq!(conv.name(), "Conv1D");
    assert_eq!(conv.kernel().len(), 4);
    assert_eq!(conv.params().activation, Activation::Relu);
}

#[test]
fn test_pool_layer_validation() {
    assert_eq!(
        MaxPool1DLayer::new(2, 2, 1).err().map(|e| e.to_string()),
        Some(CnnError::UnsupportedPadding { layer: LayerKind::MaxPool, padding: 1 }.to_string())
    );
    assert!(matches!(
        AvgPool1DLayer::new(2, 0, 0),
        Err(CnnError::ZeroStride { layer: LayerKind::AvgPool })
    ));
    assert!(matches!(
        MaxPool1DLayer::new(0, 1, 0),
        Err(CnnError::ZeroDimension { layer: LayerKind::MaxPool, what: "pool_size" })
    ));

    let pool = AvgPool1DLayer::non_overlapping(4).unwrap();
    assert_eq!(pool.output_shape(&Shape::d2(64, 23)), Ok(Shape::d2(64, 5)));
    assert!(matches!(
        pool.output_shape(&Shape::d1(320)),
        Err(CnnError::ShapeMismatch { layer: LayerKind::AvgPool, .. })
    ));
}

#[test]
fn test_dense_layer_validation() {
    static W: [i16; 6] = [0; 6];
    static B: [i16; 2] = [0; 2];

    assert_eq!(
        DenseLayer::new(&W, &B, 4, 2, Activation::Linear).err(),
        Some(CnnError::WeightMismatch { what: "dense kernel", expected: 8, actual: 6 })
    );
    let layer = DenseLayer::new(&W, &B, 3, 2, Activation::Linear).unwrap();
    // A [C, L] input with C*L == in_features is read as if flattened.
    assert_eq!(layer.output_shape(&Shape::d2(1, 3)), Ok(Shape::d1(2)));
    assert_eq!(
        layer.output_shape(&Shape::d2(2, 3)),
        Err(CnnError::ShapeMismatch { layer: LayerKind::Dense, channels: 2, length: 3 })
    );
    assert_eq!(
        DenseLayer::kernel_len(usize::MAX, 2),
        Err(CnnError::SizeOverflow { what: "dense kernel" })
    );
    assert_eq!(
        DenseLayer::new(&W, &B, usize::MAX, 2, Activation::Linear).err(),
        Some(CnnError::SizeOverflow { what: "dense kernel" })
    );
}

#[test]
fn test_flatten_is_a_reshape() {
    let flat = FlattenLayer;
    assert!(flat.is_reshape());
    assert_eq!(flat.output_shape(&Shape::d2(64, 5)), Ok(Shape::d1(320)));

    let mut out = [0i16; 4];
    flat.forward(&[1, 2, 3, 4], &Shape::d2(2, 2), &mut out, Q).unwrap();
    assert_eq!(out, [1, 2, 3, 4]);
}

// =============================================================================
// Pipeline Tests
// =============================================================================

// conv: f0 = [1, 1], f1 = [-1, 2]
static CONV_K: [i16; 4] = [1, 1, -1, 2];
static CONV_B: [i16; 2] = [0, 0];
// dense: u0 picks positions 0 and 5, u1 is position 1 minus position 3
static DENSE_W: [i16; 12] = [1, 0, 0, 0, 0, 1, 0, 1, 0, -1, 0, 0];
static DENSE_B: [i16; 2] = [0, 100];

const INPUT: [i16; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

struct Small {
    conv: Conv1DLayer<'static>,
    pool: MaxPool1DLayer,
    flat: FlattenLayer,
    dense: DenseLayer<'static>,
}

fn small() -> Small {
    Small {
        conv: Conv1DLayer::new(&CONV_K, &CONV_B, 1, 2, 2, 1, Activation::Linear).unwrap(),
        pool: MaxPool1DLayer::non_overlapping(2).unwrap(),
        flat: FlattenLayer,
        dense: DenseLayer::new(&DENSE_W, &DENSE_B, 6, 2, Activation::Linear).unwrap(),
    }
}

#[test]
fn test_pipeline_end_to_end() {
    let m = small();
    let layers: [&dyn Layer; 4] = [&m.conv, &m.pool, &m.flat, &m.dense];
    let pipeline = Pipeline::new(&layers, Shape::d2(1, 8), PT).unwrap();

    assert_eq!(pipeline.num_layers(), 4);
    assert_eq!(pipeline.output_shape(), Shape::d1(2));
    // conv output [2, 7] in front, pool output [2, 3] in back
    assert_eq!(pipeline.buffer_plan(), BufferPlan { front: 14, back: 6 });
    assert_eq!(pipeline.arena_size(), 20);

    let mut scratch = [0i16; 20];
    let mut arena = Arena::new(&mut scratch);
    let mut out = [0i16; 2];
    pipeline.run(&INPUT, &mut out, &mut arena).unwrap();
    // pooled = [5, 9, 13, 4, 6, 8]
    assert_eq!(out, [13, 105]);
    assert_eq!(arena.used(), 0);

    let class = pipeline.predict(&INPUT, &mut out, &mut arena).unwrap();
    assert_eq!(class, 1);
}

#[test]
fn test_pipeline_elides_interior_flatten() {
    let m = small();
    let layers: [&dyn Layer; 4] = [&m.conv, &m.pool, &m.flat, &m.dense];
    let pipeline = Pipeline::new(&layers, Shape::d2(1, 8), PT).unwrap();

    let mut front = [-1i16; 14];
    let mut back = [-1i16; 6];
    let mut buffers = DoubleBuffer::new(&mut front, &mut back);
    let mut out = [0i16; 2];
    pipeline.run_with_buffers(&INPUT, &mut out, &mut buffers).unwrap();

    assert_eq!(out, [13, 105]);
    // flatten neither copied the pooled data into front nor flipped the slots
    assert_eq!(buffers.front(), &[3, 5, 7, 9, 11, 13, 15, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(buffers.back(), &[5, 9, 13, 4, 6, 8]);
}

#[test]
fn test_pipeline_flatten_at_the_edges_copies() {
    static W: [i16; 4] = [1, 1, 1, 1];
    static B: [i16; 1] = [0];
    let flat = FlattenLayer;
    let dense = DenseLayer::new(&W, &B, 4, 1, Activation::Linear).unwrap();

    let first: [&dyn Layer; 2] = [&flat, &dense];
    let pipeline = Pipeline::new(&first, Shape::d2(2, 2), PT).unwrap();
    assert_eq!(pipeline.buffer_plan(), BufferPlan { front: 4, back: 0 });
    let mut scratch = [0i16; 4];
    let mut arena = Arena::new(&mut scratch);
    let mut out = [0i16; 1];
    pipeline.run(&[1, 2, 3, 4], &mut out, &mut arena).unwrap();
    assert_eq!(out, [10]);

    let conv = Conv1DLayer::new(&CONV_K, &CONV_B, 1, 2, 2, 1, Activation::Linear).unwrap();
    let last: [&dyn Layer; 2] = [&conv, &flat];
    let pipeline = Pipeline::new(&last, Shape::d2(1, 3), PT).unwrap();
    assert_eq!(pipeline.output_shape(), Shape::d1(4));
    let mut out = [0i16; 4];
    let mut scratch = [0i16; 4];
    let mut arena = Arena::new(&mut scratch);
    pipeline.run(&[1, 2, 3], &mut out, &mut arena).unwrap();
    assert_eq!(out, [3, 5, 3, 4]);
}

#[test]
fn test_single_layer_pipeline_needs_no_scratch() {
    static W: [i16; 2] = [2, 3];
    static B: [i16; 1] = [1];
    let dense = DenseLayer::new(&W, &B, 2, 1, Activation::Linear).unwrap();
    let layers: [&dyn Layer; 1] = [&dense];
    let pipeline = Pipeline::new(&layers, Shape::d1(2), PT).unwrap();
    assert_eq!(pipeline.arena_size(), 0);

    let mut arena = Arena::new(&mut []);
    let mut out = [0i16; 1];
    pipeline.run(&[10, 100], &mut out, &mut arena).unwrap();
    assert_eq!(out, [321]);
}

#[test]
fn test_pipeline_rejects_bad_chains() {
    let layers: [&dyn Layer; 0] = [];
    assert!(matches!(
        Pipeline::new(&layers, Shape::d2(1, 8), Q),
        Err(CnnError::EmptyPipeline)
    ));

    let m = small();
    let layers: [&dyn Layer; 2] = [&m.conv, &m.dense];
    // conv yields [2, 7] = 14 values, dense wants 6
    assert!(matches!(
        Pipeline::new(&layers, Shape::d2(1, 8), Q),
        Err(CnnError::ShapeMismatch { layer: LayerKind::Dense, channels: 2, length: 7 })
    ));

    let layers: [&dyn Layer; 1] = [&m.conv];
    assert!(matches!(
        Pipeline::new(&layers, Shape::d2(2, 8), Q),
        Err(CnnError::ShapeMismatch { layer: LayerKind::Conv, .. })
    ));
    assert!(matches!(
        Pipeline::new(&layers, Shape::d2(usize::MAX, 2), Q),
        Err(CnnError::SizeOverflow { what: "input shape" })
    ));
}

#[test]
fn test_pipeline_checks_io_and_scratch() {
    let m = small();
    let layers: [&dyn Layer; 4] = [&m.conv, &m.pool, &m.flat, &m.dense];
    let pipeline = Pipeline::new(&layers, Shape::d2(1, 8), PT).unwrap();

    let mut scratch = [0i16; 19];
    let mut arena = Arena::new(&mut scratch);
    let mut out = [0i16; 2];
    assert_eq!(
        pipeline.run(&INPUT, &mut out, &mut arena),
        Err(CnnError::ArenaExhausted { requested: 20, remaining: 19 })
    );
    assert_eq!(arena.used(), 0);

    let mut scratch = [0i16; 32];
    let mut arena = Arena::new(&mut scratch);
    assert_eq!(
        pipeline.run(&INPUT[..7], &mut out, &mut arena),
        Err(CnnError::DimensionMismatch { expected: 8, actual: 7 })
    );
    assert_eq!(
        pipeline.run(&INPUT, &mut out[..1], &mut arena),
        Err(CnnError::DimensionMismatch { expected: 2, actual: 1 })
    );

    let mut front = [0i16; 14];
    let mut back = [0i16; 5];
    let mut buffers = DoubleBuffer::new(&mut front, &mut back);
    assert_eq!(
        pipeline.run_with_buffers(&INPUT, &mut out, &mut buffers),
        Err(CnnError::BufferTooSmall { required: 6, available: 5 })
    );
}

#[test]
fn test_pipeline_runs_from_static_store() {
    let m = small();
    let layers: [&dyn Layer; 4] = [&m.conv, &m.pool, &m.flat, &m.dense];
    let pipeline = Pipeline::new(&layers, Shape::d2(1, 8), PT).unwrap();

    let mut store: ActivationStore<14, 6> = ActivationStore::new();
    let mut out = [0i16; 2];
    pipeline.run_with_buffers(&INPUT, &mut out, &mut store.buffers()).unwrap();
    assert_eq!(out, [13, 105]);

    let input = Tensor::<8>::from_slice(&INPUT).unwrap();
    let mut output = Tensor::<2>::zeros();
    pipeline
        .run_with_buffers(input.as_slice(), output.as_mut_slice(), &mut store.buffers())
        .unwrap();
    assert_eq!(output.get(1), Some(105));
}

#[test]
fn test_pipeline_accessors() {
    let m = small();
    let layers: [&dyn Layer; 4] = [&m.conv, &m.pool, &m.flat, &m.dense];
    let pipeline = Pipeline::new(&layers, Shape::d2(1, 8), Q).unwrap();

    assert_eq!(pipeline.input_shape(), Shape::d2(1, 8));
    assert_eq!(pipeline.format(), Q);
    let names: Vec<_> = (0..pipeline.num_layers())
        .filter_map(|i| pipeline.layer(i))
        .map(|l| l.name())
        .collect();
    assert_eq!(names, ["Conv1D", "MaxPool1D", "Flatten", "Dense"]);
    assert!(pipeline.layer(4).is_none());
}
