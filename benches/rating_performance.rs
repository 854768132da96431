//! Performance benchmarks for rating and matchmaking hot paths

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use trivia_arena::gateway::ConnectionHandle;
use trivia_arena::matchmaking::{pair_first_match, QueuePolicy, QueuedPlayer};
use trivia_arena::rating::{
    EloCalculator, InMemoryProfileStore, MatchOutcome, RankedEntrant, RatingSettlement,
    SettlementPolicy,
};

fn queued_pool(size: usize, joined_at: Instant) -> Vec<QueuedPlayer> {
    (0..size)
        .map(|i| {
            let (connection, _rx) = ConnectionHandle::channel();
            QueuedPlayer {
                user_id: format!("user_{}", i),
                username: format!("Player{}", i),
                // Spread ratings so only some neighbours are within tolerance
                rating: 800 + ((i * 37) % 1200) as i32,
                connection,
                joined_at,
            }
        })
        .collect()
}

fn bench_elo_calculations(c: &mut Criterion) {
    let calculator = EloCalculator::default();

    c.bench_function("elo_even_match", |b| {
        b.iter(|| black_box(calculator.calculate(black_box(1000), black_box(1000))))
    });

    c.bench_function("elo_upset", |b| {
        b.iter(|| black_box(calculator.calculate(black_box(1100), black_box(1900))))
    });
}

fn bench_pairing(c: &mut Criterion) {
    let policy = QueuePolicy::default();
    let mut group = c.benchmark_group("pair_first_match");

    for size in [10usize, 100, 1000] {
        let joined_at = Instant::now();
        let template = queued_pool(size, joined_at);
        let now = joined_at + Duration::from_secs(10);

        group.bench_with_input(BenchmarkId::from_parameter(size), &template, |b, template| {
            b.iter(|| {
                let mut pool = template.clone();
                black_box(pair_first_match(&mut pool, now, &policy))
            })
        });
    }

    group.finish();
}

fn bench_settlement(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryProfileStore::new());
    let settlement = RatingSettlement::new(
        store,
        EloCalculator::default(),
        SettlementPolicy::default(),
    );

    c.bench_function("settle_ranked_match", |b| {
        b.iter(|| {
            let outcome = MatchOutcome {
                match_id: uuid::Uuid::new_v4(),
                entrants: [
                    RankedEntrant {
                        player_id: "p1".to_string(),
                        user_id: "user_1".to_string(),
                        username: "Alice".to_string(),
                        score: 7,
                    },
                    RankedEntrant {
                        player_id: "p2".to_string(),
                        user_id: "user_2".to_string(),
                        username: "Bob".to_string(),
                        score: 5,
                    },
                ],
            };
            black_box(rt.block_on(settlement.settle(&outcome)))
        })
    });
}

criterion_group!(
    benches,
    bench_elo_calculations,
    bench_pairing,
    bench_settlement
);
criterion_main!(benches);
