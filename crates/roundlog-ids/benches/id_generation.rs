use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use roundlog_ids::RoundId;

fn bench_round_id(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
    c.bench_function("round_id_derive", |b| {
        b.iter(|| {
            RoundId::derive(
                black_box("player_with_a_long_name"),
                black_box("eu-west-7"),
                black_box("de_inferno"),
                black_box(start),
                black_box("session-0042"),
            )
        })
    });
}

criterion_group!(benches, bench_round_id);
criterion_main!(benches);
