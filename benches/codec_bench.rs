//! Codec benchmarks.
//!
//! - Structural precompute (peel, compress, triangulate) per block count
//! - Full encoder construction including the block solve
//! - Repair block generation throughput
//! - Decode from a lossy stream
//!
//! Parameters are searched once outside the timed loops; inputs use fixed
//! seeds so runs are comparable.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use wirehair::codec::{DecodeProgress, Decoder, Design, Encoder, SolvePlan};
use wirehair::util::DetRng;

const BLOCK_SIZE: usize = 1280;
const BLOCK_COUNTS: [usize; 3] = [64, 256, 1024];

fn message(len: usize) -> Vec<u8> {
    let mut rng = DetRng::new(0xB10C);
    (0..len).map(|_| (rng.next_u32() >> 24) as u8).collect()
}

// =============================================================================
// PRECOMPUTE
// =============================================================================

fn bench_precompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("precompute");

    for &k in &BLOCK_COUNTS {
        let msg = message(k * BLOCK_SIZE);
        let params = Encoder::new(&msg, BLOCK_SIZE)
            .expect("encoder builds")
            .params();

        group.bench_with_input(BenchmarkId::new("plan_build", k), &k, |b, &k| {
            b.iter(|| {
                let design = Design::new(k as u16, params.check_blocks, params.seed)
                    .expect("design builds");
                black_box(SolvePlan::build(&design).expect("plan builds"))
            });
        });

        group.throughput(Throughput::Bytes(msg.len() as u64));
        group.bench_with_input(BenchmarkId::new("encoder_new", k), &msg, |b, msg| {
            b.iter(|| {
                black_box(Encoder::with_params(msg, BLOCK_SIZE, params).expect("encoder builds"))
            });
        });
    }

    group.finish();
}

// =============================================================================
// GENERATE
// =============================================================================

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.throughput(Throughput::Bytes(BLOCK_SIZE as u64));

    for &k in &BLOCK_COUNTS {
        let msg = message(k * BLOCK_SIZE);
        let encoder = Encoder::new(&msg, BLOCK_SIZE).expect("encoder builds");
        let mut out = vec![0u8; BLOCK_SIZE];

        group.bench_function(BenchmarkId::new("repair", k), |b| {
            let mut id = k as u32;
            b.iter(|| {
                encoder.generate_into(black_box(id), &mut out);
                id = id.wrapping_add(1) & wirehair::codec::MAX_WIRE_ID;
                black_box(&out);
            });
        });

        group.bench_function(BenchmarkId::new("message", k), |b| {
            let mut id = 0u32;
            b.iter(|| {
                encoder.generate_into(black_box(id), &mut out);
                id = (id + 1) % k as u32;
                black_box(&out);
            });
        });
    }

    group.finish();
}

// =============================================================================
// DECODE
// =============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &k in &BLOCK_COUNTS {
        let msg = message(k * BLOCK_SIZE);
        let encoder = Encoder::new(&msg, BLOCK_SIZE).expect("encoder builds");
        // Every tenth message block lost, then repairs until ready.
        let frames: Vec<(u32, Vec<u8>)> = (0..k as u32)
            .filter(|id| id % 10 != 0)
            .chain(k as u32..3 * k as u32)
            .map(|id| (id, encoder.generate(id)))
            .collect();

        group.throughput(Throughput::Bytes(msg.len() as u64));
        group.bench_with_input(BenchmarkId::new("lossy_10pct", k), &frames, |b, frames| {
            b.iter(|| {
                let mut decoder = Decoder::new(msg.len(), BLOCK_SIZE).expect("decoder builds");
                for (id, payload) in frames {
                    if decoder.feed(*id, payload).expect("feed") == DecodeProgress::Ready {
                        break;
                    }
                }
                black_box(decoder.reconstruct().expect("reconstruct"))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_precompute, bench_generate, bench_decode);
criterion_main!(benches);
