//! Codec benchmarks for coedit-protocol.

use coedit_protocol::{
    codec, ClientEvent, DocumentChange, Encoding, PresenceEntry, PresenceSnapshot, ServerEvent,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

fn edit(len: usize) -> ClientEvent {
    ClientEvent::DocumentChange(DocumentChange {
        document_id: "65a1f0c2e4b0a1b2c3d4e5f6".into(),
        changes: json!({"text": "x".repeat(len), "timestamp": "2024-01-01T00:00:00.000Z"}),
    })
}

fn snapshot(members: usize) -> ServerEvent {
    ServerEvent::ActiveUsers(PresenceSnapshot {
        document_id: "65a1f0c2e4b0a1b2c3d4e5f6".into(),
        users: (0..members)
            .map(|i| PresenceEntry {
                id: format!("user-{i}"),
                name: format!("User {i}"),
                is_typing: i % 3 == 0,
            })
            .collect(),
    })
}

fn bench_decode_edit(c: &mut Criterion) {
    let event = edit(1024);
    let text = codec::encode_json(&event).unwrap();
    let binary = codec::encode(&event).unwrap();

    let mut group = c.benchmark_group("decode_edit_1KiB");
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("json", |b| {
        b.iter(|| codec::decode_json::<ClientEvent>(black_box(&text)))
    });
    group.bench_function("msgpack", |b| {
        b.iter(|| codec::decode::<ClientEvent>(black_box(&binary)))
    });
    group.finish();
}

fn bench_encode_snapshot(c: &mut Criterion) {
    let event = snapshot(32);

    let mut group = c.benchmark_group("encode_snapshot_32");
    group.bench_function("json", |b| {
        b.iter(|| Encoding::Json.encode(black_box(&event)))
    });
    group.bench_function("msgpack", |b| {
        b.iter(|| Encoding::MessagePack.encode(black_box(&event)))
    });
    group.finish();
}

criterion_group!(benches, bench_decode_edit, bench_encode_snapshot);
criterion_main!(benches);
