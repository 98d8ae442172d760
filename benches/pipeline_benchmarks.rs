// benches/pipeline_benchmarks.rs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::f32::consts::PI;

use gesture_core::acquisition::SampleBlock;
use gesture_core::inference::{decode_model, encode_model, DecisionTree, Fixed, ForestModel, TreeNode};
use gesture_core::processing::{FeatureExtractor, FeatureVector, SignalConditioner, SlidingWindow};
use gesture_core::utils::volts_to_counts;
use gesture_core::PipelineConfig;

const CHANNEL_MASKS: &[(&str, u8)] = &[("1ch", 0b0001), ("4ch", 0b1111)];
const BLOCK_SIZE: usize = 64;
const WINDOW_SIZE: usize = 256;
const HOP: usize = WINDOW_SIZE / 2;

fn tone_frame(tick: u64) -> [i32; 4] {
    let t = tick as f32 / 1000.0;
    let volts = 0.001 * (2.0 * PI * 125.0 * t).sin();
    [volts_to_counts(volts, 24); 4]
}

fn masked_config(mask: u8) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.acquisition.channel_mask = mask;
    config
}

fn filled_block() -> SampleBlock {
    let mut block = SampleBlock::new();
    for tick in 0..BLOCK_SIZE as u64 {
        block.push_frame(tone_frame(tick));
    }
    block
}

/// Full-capacity forest: 15 perfect depth-5 trees over 30 features.
fn full_model() -> ForestModel {
    let trees = (0..15u8)
        .map(|seed| {
            let mut nodes = Vec::with_capacity(63);
            for i in 0..31u8 {
                nodes.push(TreeNode::Split {
                    feature: (i + seed) % 30,
                    threshold: Fixed::from_f32((i % 7) as f32 - 3.0),
                    left: 2 * i + 1,
                    right: 2 * i + 2,
                });
            }
            for i in 31..63u8 {
                nodes.push(TreeNode::Leaf {
                    class: (i + seed) % 29,
                });
            }
            DecisionTree::new(nodes, 0)
        })
        .collect();
    let scale = (0..30).map(|i| Fixed::from_f32(0.5 + i as f32 * 0.05)).collect();
    let offset = (0..30).map(|i| Fixed::from_f32(i as f32 * 0.1 - 1.5)).collect();
    ForestModel::new(trees, 30, 29, scale, offset).unwrap()
}

fn full_vector() -> FeatureVector {
    let mut vector = FeatureVector::new(0);
    for i in 0..30 {
        vector.push(i as f32 * 0.3 - 4.0);
    }
    vector
}

fn benchmark_conditioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditioning");
    for &(label, mask) in CHANNEL_MASKS {
        group.throughput(Throughput::Elements(BLOCK_SIZE as u64));
        group.bench_with_input(BenchmarkId::new("process_block", label), &mask, |b, &mask| {
            let config = masked_config(mask);
            let mut conditioner = SignalConditioner::new(&config);
            let block = filled_block();
            let mut out = [[0.0f32; 4]; 256];

            b.iter(|| conditioner.process_block(black_box(&block), &mut out));
        });
    }
    group.finish();
}

fn benchmark_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    for &(label, mask) in CHANNEL_MASKS {
        group.bench_with_input(BenchmarkId::new("extract", label), &mask, |b, &mask| {
            let config = masked_config(mask);
            let mut extractor = FeatureExtractor::new(&config);
            let mut window = SlidingWindow::new(WINDOW_SIZE);
            for tick in 0..WINDOW_SIZE as u64 {
                let frame = tone_frame(tick);
                window.push(frame.map(|code| code as f32 * 1e-7));
            }

            b.iter(|| extractor.extract(black_box(&window), 0));
        });
    }

    // Per-channel spectra quadruple the FFT work of the aggregate path.
    group.bench_function("extract_per_channel_spectra", |b| {
        let mut config = masked_config(0b1111);
        config.features.aggregate_spectrum = false;
        let mut extractor = FeatureExtractor::new(&config);
        let mut window = SlidingWindow::new(WINDOW_SIZE);
        for tick in 0..WINDOW_SIZE as u64 {
            let frame = tone_frame(tick);
            window.push(frame.map(|code| code as f32 * 1e-7));
        }

        b.iter(|| extractor.extract(black_box(&window), 0));
    });
    group.finish();
}

fn benchmark_window_hop(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_hop");
    group.throughput(Throughput::Elements(HOP as u64));
    group.bench_function("push_extract_advance", |b| {
        let config = masked_config(0b1111);
        let mut extractor = FeatureExtractor::new(&config);
        let mut window = SlidingWindow::new(WINDOW_SIZE);
        for tick in 0..WINDOW_SIZE as u64 {
            let frame = tone_frame(tick);
            window.push(frame.map(|code| code as f32 * 1e-7));
        }
        window.advance();
        let mut tick = WINDOW_SIZE as u64;

        b.iter(|| {
            for _ in 0..HOP {
                let frame = tone_frame(tick);
                tick += 1;
                window.push(frame.map(|code| code as f32 * 1e-7));
            }
            let vector = extractor.extract(&window, tick);
            window.advance();
            vector
        });
    });
    group.finish();
}

fn benchmark_forest_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");
    group.bench_function("predict_full_forest", |b| {
        let model = full_model();
        let vector = full_vector();

        b.iter(|| model.predict(black_box(&vector)).unwrap());
    });
    group.finish();
}

fn benchmark_model_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_codec");
    group.bench_function("decode_full_blob", |b| {
        let blob = encode_model(&full_model());

        b.iter(|| decode_model(black_box(&blob)).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_conditioning,
    benchmark_feature_extraction,
    benchmark_window_hop,
    benchmark_forest_predict,
    benchmark_model_codec
);
criterion_main!(benches);
