//! Registry benchmarks.
//!
//! Membership churn and change fan-out, measured without any sockets.

use coedit_bench::{populated_room, Viewer};
use coedit_core::{SessionRegistry, TypingSignal};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

/// Join and leave a document repeatedly.
fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    for members in [1usize, 16, 128] {
        let (registry, mut viewers) = populated_room("doc", members);
        let mut newcomer = Viewer::new(members);

        group.bench_with_input(BenchmarkId::new("join_leave", members), &members, |b, _| {
            b.iter(|| {
                newcomer.join(&registry, black_box("doc"));
                registry.leave(black_box("doc"), &newcomer.identity.participant_id);
                newcomer.drain();
                for viewer in &mut viewers {
                    viewer.drain();
                }
            });
        });
    }

    group.bench_function("disconnect_all_8_rooms", |b| {
        let registry = SessionRegistry::default();
        let mut viewer = Viewer::new(0);
        b.iter(|| {
            for room in 0..8 {
                viewer.join(&registry, &format!("doc-{room}"));
            }
            registry.disconnect_all(black_box(&viewer.identity.participant_id));
            viewer.drain();
        });
    });

    group.finish();
}

/// Relay one change to every other member of a room.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    let changes = json!({"text": "x".repeat(1024), "timestamp": "2024-05-01T12:00:00.000Z"});

    for members in [2usize, 16, 128, 1024] {
        let (registry, mut viewers) = populated_room("doc", members);
        let sender = viewers[0].identity.participant_id.clone();

        group.throughput(Throughput::Elements(members as u64 - 1));
        group.bench_with_input(BenchmarkId::new("relay", members), &members, |b, _| {
            b.iter(|| {
                let delivered = registry.relay("doc", &sender, black_box(changes.clone()));
                for viewer in &mut viewers[1..] {
                    viewer.drain();
                }
                delivered
            });
        });
    }

    for members in [16usize, 128] {
        let (registry, mut viewers) = populated_room("doc", members);
        let typist = viewers[0].identity.participant_id.clone();

        group.bench_with_input(BenchmarkId::new("typing", members), &members, |b, _| {
            b.iter(|| {
                registry.typing("doc", &typist, TypingSignal::Start);
                registry.typing("doc", &typist, TypingSignal::End);
                for viewer in &mut viewers {
                    viewer.drain();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_churn, bench_fanout);
criterion_main!(benches);
