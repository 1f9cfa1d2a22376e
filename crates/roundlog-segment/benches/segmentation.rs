use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use roundlog_config::SegmentationConfig;
use roundlog_schema::sample::Sample;
use roundlog_segment::Segmenter;

fn stream(players: usize, polls: usize) -> Vec<Sample> {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
    let mut out = Vec::with_capacity(players * polls);
    for p in 0..players {
        for i in 0..polls {
            // 20 polls per round, then counters reset.
            let within = (i % 20) as i64;
            out.push(Sample {
                player_name: format!("player-{p}"),
                server_id: format!("srv-{}", p % 4),
                map_name: format!("map-{}", (i / 20) % 3),
                timestamp: start + Duration::minutes(i as i64),
                kills: within,
                deaths: within / 3,
                score: within * 10,
                ping: 40,
                is_bot: false,
                session_id: String::new(),
                team_label: None,
                game_id: None,
            });
        }
    }
    out
}

fn bench_segment(c: &mut Criterion) {
    let segmenter = Segmenter::new(&SegmentationConfig::default());
    let mut group = c.benchmark_group("segment");
    for players in [10usize, 100] {
        let samples = stream(players, 500);
        group.bench_with_input(BenchmarkId::from_parameter(players), &samples, |b, s| {
            b.iter(|| segmenter.segment(black_box(s.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_segment);
criterion_main!(benches);
