//! Criterion benchmarks for ebb-escrow hot paths.
//!
//! Covers: the bounded catch-up walk, read-only projection, historical
//! supply lookup, and a full create-lock call.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ebb_core::clock::ManualClock;
use ebb_core::config::EscrowConfig;
use ebb_core::constants::{DAY, UNIT};
use ebb_core::types::{AccountId, Point};
use ebb_core::vault::MemoryVault;
use ebb_escrow::schedule::SlopeSchedule;
use ebb_escrow::supply::{catch_up, project};
use ebb_escrow::VotingEscrow;

const WEEK: u64 = 7 * DAY;
const START: u64 = 1_000 * WEEK;

/// A global point with one scheduled change at every interval for 200 weeks.
fn busy_schedule() -> (Point, SlopeSchedule) {
    let mut schedule = SlopeSchedule::new();
    let mut slope = 0i128;
    let mut bias = 0i128;
    for i in 1..=200u64 {
        let s = 1_000_000 + i as i128;
        slope += s;
        bias += s * (i * WEEK) as i128;
        schedule.adjust(START + i * WEEK, -s).expect("schedule");
    }
    let point = Point {
        bias,
        slope,
        timestamp: START,
        position: 0,
    };
    (point, schedule)
}

fn bench_catch_up(c: &mut Criterion) {
    let (point, schedule) = busy_schedule();
    let config = EscrowConfig {
        interval: WEEK,
        ..EscrowConfig::default()
    };
    let now = START + 200 * WEEK;

    c.bench_function("catch_up_200_intervals", |b| {
        b.iter(|| catch_up(black_box(&point), &schedule, &config, black_box(now), 200))
    });
}

fn bench_project(c: &mut Criterion) {
    let (point, schedule) = busy_schedule();
    let target = START + 150 * WEEK + DAY;

    c.bench_function("project_150_intervals", |b| {
        b.iter(|| project(black_box(&point), &schedule, black_box(target)))
    });
}

fn bench_total_supply_at(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(START, 1));
    let mut vault = MemoryVault::new();
    let labels: Vec<String> = (0..100).map(|i| format!("acct-{i}")).collect();
    for label in &labels {
        vault
            .mint(&AccountId::from_label(label), 1_000 * UNIT)
            .expect("mint");
    }
    let config = EscrowConfig {
        interval: WEEK,
        ..EscrowConfig::default()
    };
    let mut escrow = VotingEscrow::new(config, clock.clone(), vault).expect("escrow");
    for (i, label) in labels.iter().enumerate() {
        let unlock = clock.now() + (i as u64 % 50 + 1) * WEEK;
        escrow
            .create_lock(&AccountId::from_label(label), 100 * UNIT, unlock)
            .expect("lock");
        clock.advance(DAY);
    }
    let position = clock.position() / 2;

    c.bench_function("total_supply_at_100_locks", |b| {
        b.iter(|| escrow.total_supply_at(black_box(position)))
    });
}

fn bench_create_lock(c: &mut Criterion) {
    let config = EscrowConfig {
        interval: WEEK,
        ..EscrowConfig::default()
    };
    let account = AccountId::from_label("bench");

    c.bench_function("create_lock", |b| {
        b.iter_batched(
            || {
                let clock = Arc::new(ManualClock::new(START, 1));
                let mut vault = MemoryVault::new();
                vault.mint(&account, UNIT).expect("mint");
                VotingEscrow::new(config, clock, vault).expect("escrow")
            },
            |mut escrow| escrow.create_lock(&account, black_box(UNIT), START + 52 * WEEK),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_catch_up,
    bench_project,
    bench_total_supply_at,
    bench_create_lock,
);
criterion_main!(benches);
