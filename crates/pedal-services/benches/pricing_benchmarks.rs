//! Benchmarks for rental pricing
//!
//! Run with: cargo bench --package pedal-services

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pedal_services::pricing::{compute_rental_price, price_breakdown};
use rust_decimal_macros::dec;

/// Benchmark a single quote in each tier
fn bench_single_quote(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let mut group = c.benchmark_group("rental_price");

    for minutes in [45_i64, 95, 191] {
        let end = start + Duration::minutes(minutes);
        group.bench_with_input(BenchmarkId::from_parameter(minutes), &end, |b, end| {
            b.iter(|| compute_rental_price(black_box(start), black_box(*end), black_box(dec!(49.99))));
        });
    }

    group.finish();
}

/// Benchmark breakdowns over a day of rental lengths
fn bench_breakdown_sweep(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let ends: Vec<_> = (1..=1440).map(|m| start + Duration::minutes(m)).collect();

    let mut group = c.benchmark_group("breakdown_sweep");
    group.throughput(Throughput::Elements(ends.len() as u64));
    group.bench_function("one_day", |b| {
        b.iter(|| {
            for end in &ends {
                black_box(price_breakdown(start, *end, dec!(33)));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_single_quote, bench_breakdown_sweep);
criterion_main!(benches);
