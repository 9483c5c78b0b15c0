//! Spectral transform benchmarks
//!
//! Run with: cargo bench --bench spectral

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spectral_voice_link::audio::RingBuffer;
use spectral_voice_link::config::DspConfig;
use spectral_voice_link::dsp::SpectralEngine;

fn test_block(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 0.05).sin() * 0.5 + (i as f32 * 0.31).cos() * 0.1)
        .collect()
}

fn bench_spectral_block(c: &mut Criterion) {
    let sizes = [256, 512, 1024, 2048];

    let mut group = c.benchmark_group("spectral_block");

    for size in sizes {
        group.throughput(Throughput::Elements(size as u64));

        let mut engine = SpectralEngine::new(size, DspConfig::default()).unwrap();
        let input = test_block(size);
        let mut output = vec![0.0f32; size];

        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |bencher, input| {
            bencher.iter(|| engine.process(black_box(input), black_box(&mut output)))
        });
    }

    group.finish();
}

fn bench_ring_round_trip(c: &mut Criterion) {
    let (mut producer, mut consumer) = RingBuffer::<8>::new(1024).split();
    let block = test_block(1024);
    let mut out = vec![0.0f32; 1024];

    c.bench_function("ring_push_pop_1024", |bencher| {
        bencher.iter(|| {
            producer.push(black_box(&block));
            consumer.pop(black_box(&mut out))
        })
    });
}

criterion_group!(benches, bench_spectral_block, bench_ring_round_trip);
criterion_main!(benches);
