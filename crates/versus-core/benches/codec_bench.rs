//! Criterion benchmarks for the Versus JSON codec.
//!
//! Every relayed `move` is decoded once by the server, so decode latency sits
//! directly on the opponent's input path.
//!
//! Run with:
//! ```bash
//! cargo bench --package versus-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use versus_core::{decode, encode, Direction, Envelope, Outcome, Seat};

fn fixtures() -> Vec<(&'static str, Envelope)> {
    vec![
        ("init", Envelope::init(Seat::One)),
        ("start", Envelope::start()),
        ("move", Envelope::movement(Seat::Two, Direction::Left)),
        ("game_over", Envelope::outcome(Outcome::Win)),
        ("restart", Envelope::restart()),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| encode(black_box(msg)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, msg) in fixtures() {
        let text = encode(&msg).expect("fixture must encode");
        group.bench_with_input(BenchmarkId::from_parameter(name), &text, |b, text| {
            b.iter(|| decode(black_box(text.as_bytes())))
        });
    }
    group.bench_function("unknown_type", |b| {
        b.iter(|| decode(black_box(br#"{"type":"chat","text":"hello"}"#)))
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
