// Dedup ledger benchmarks
//
// Hot path of every scan: one `seen` per fetched event, one `record` per
// delivered notification, and a compaction every capacity/2 records.

use alloy_primitives::B256;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reward_notifier::ledger::DedupLedger;
use reward_notifier::types::EventKey;

fn key(i: u64) -> EventKey {
    EventKey::TxLog(B256::left_padding_from(&i.to_be_bytes()), i % 4)
}

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_record");
    for capacity in [100usize, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let mut ledger = DedupLedger::new(capacity);
                    for i in 0..(capacity as u64 * 3) {
                        ledger.record(key(i));
                    }
                    black_box(ledger.len())
                })
            },
        );
    }
    group.finish();
}

fn bench_seen(c: &mut Criterion) {
    let ledger = DedupLedger::from_keys((0..1_000).map(key), 1_000);
    c.bench_function("ledger_seen_hit", |b| {
        b.iter(|| black_box(ledger.seen(black_box(&key(750)))))
    });
    c.bench_function("ledger_seen_miss", |b| {
        b.iter(|| black_box(ledger.seen(black_box(&key(5_000)))))
    });
}

fn bench_key_roundtrip(c: &mut Criterion) {
    let keys: Vec<String> = (0..1_000).map(|i| key(i).to_string()).collect();
    c.bench_function("event_key_parse_1000", |b| {
        b.iter(|| {
            keys.iter()
                .filter_map(|s| s.parse::<EventKey>().ok())
                .count()
        })
    });
}

criterion_group!(benches, bench_record, bench_seen, bench_key_roundtrip);
criterion_main!(benches);
