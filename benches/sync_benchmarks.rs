//! Performance benchmarks for the barrier hot paths
//!
//! Framing runs once per request; classification runs once per event
//! drained while waiting, so both stay on the fast path.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use wmsync::{
    display::{DisplayEvent, StructureKind, WindowId},
    ipc::codec,
    sync::{classify, SyncRequest, SyncToken, TokenSource, Verdict},
};

/// Benchmark i3-ipc framing
fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");
    let payload = br#"{"rnd":3735928559,"window":4194305}"#;

    group.bench_function("encode_sync_request", |b| {
        b.iter(|| black_box(codec::encode(codec::SYNC, black_box(payload))))
    });

    let frame = codec::encode(codec::SYNC, payload);
    let mut header = [0u8; codec::HEADER_LEN];
    header.copy_from_slice(&frame[..codec::HEADER_LEN]);
    group.bench_function("decode_header", |b| {
        b.iter(|| black_box(codec::decode_header(black_box(&header))))
    });

    group.finish();
}

/// Benchmark draining a noisy event stream
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let expected = SyncRequest::new(WindowId(0x0040_0001), SyncToken::new(0xdeadbeef));

    for noise in [10usize, 100, 1000].iter() {
        let mut events: Vec<DisplayEvent> = (0..*noise)
            .map(|i| match i % 3 {
                0 => DisplayEvent::Structure {
                    window: WindowId(i as u32),
                    kind: StructureKind::Configure,
                },
                1 => DisplayEvent::SyncNotify {
                    window: WindowId(0x0050_0000 + i as u32),
                    payload: [0x0050_0000 + i as u32, i as u32],
                },
                _ => DisplayEvent::Other { response_type: 28 },
            })
            .collect();
        events.push(DisplayEvent::SyncNotify {
            window: expected.window,
            payload: expected.payload(),
        });

        group.bench_function(format!("drain_{}_events", noise), |b| {
            b.iter(|| {
                events
                    .iter()
                    .position(|ev| classify(black_box(ev), &expected) == Verdict::Resolved)
            })
        });
    }

    group.finish();
}

/// Benchmark token issue with collision tracking
fn bench_tokens(c: &mut Criterion) {
    c.bench_function("issue_1000_tokens", |b| {
        b.iter_batched(
            || TokenSource::seeded(42),
            |mut tokens| {
                for _ in 0..1000 {
                    black_box(tokens.next_token());
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_framing, bench_classify, bench_tokens);
criterion_main!(benches);
