//! Criterion benchmarks for the WRP MessagePack codec.
//!
//! Measures encoding and decoding latency for representative messages,
//! including a payload-heavy request so the `bin` path is exercised.
//!
//! Run with:
//! ```bash
//! cargo bench --package wrp-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wrp_core::{Codec, Message, MessageType};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_auth() -> Message {
    Message {
        status: Some(200),
        ..Message::new(MessageType::Auth)
    }
}

fn make_event() -> Message {
    Message {
        source: "mac:112233445566".to_string(),
        destination: "event:device-status/mac:112233445566/online".to_string(),
        payload: br#"{"id":"mac:112233445566","ts":"2024-01-01T00:00:00Z"}"#.to_vec(),
        ..Message::new(MessageType::SimpleEvent)
    }
}

fn make_large_request() -> Message {
    Message {
        transaction_uuid: "5f0b3d1c-6a8e-4c02-9f7d-3a1b2c4d5e6f".to_string(),
        source: "dns:scytale.example.com/api/v2".to_string(),
        destination: "mac:112233445566/config".to_string(),
        payload: vec![0x5A; 16 * 1024],
        ..Message::new(MessageType::SimpleRequestResponse)
    }
}

fn fixtures() -> Vec<(&'static str, Message)> {
    vec![
        ("auth", make_auth()),
        ("event", make_event()),
        ("request_16k", make_large_request()),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let codec = Codec::default();
    let mut group = c.benchmark_group("encode");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| codec.encode(black_box(msg)).unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = Codec::default();
    let mut group = c.benchmark_group("decode");
    for (name, msg) in fixtures() {
        let bytes = codec.encode(&msg).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| codec.decode(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
