//! Benchmarks for the filter engine.
//!
//! Measures single predicates and conjunctive queries over a synthetic
//! 100k-record capture, plus the capture summary that seeds every question.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pcapai_core::{FieldValue, Fields, PacketRecord};
use pcapai_filter::{by_index_range, by_operation, by_protocol, by_time_range, CaptureSummary};
use pcapai_filter::{Predicate, Query};

const RECORDS: u64 = 100_000;

/// Mixed HTTP / NFS / DNS traffic, one record per millisecond.
fn generate_records(count: u64) -> Vec<PacketRecord> {
    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    (1..=count)
        .map(|index| {
            let mut fields = Fields::new();
            fields.insert_if_absent("ip", "src", format!("10.0.{}.{}", index % 7, index % 251).into());
            fields.insert_if_absent("ip", "dst", "10.0.0.254".into());
            let (app, op) = match index % 3 {
                0 => ("http", if index % 2 == 0 { "GET" } else { "POST" }),
                1 => ("nfs", if index % 5 == 0 { "WRITE" } else { "READ" }),
                _ => ("dns", "QUERY"),
            };
            fields.insert_if_absent(app, "operation", FieldValue::from(op));
            PacketRecord::new(
                index,
                base + chrono::Duration::milliseconds(index as i64),
                vec!["eth".into(), "ip".into(), "tcp".into(), app.into()],
                Some(64 + index % 1400),
                fields,
                Vec::new(),
            )
        })
        .collect()
}

fn bench_single_predicates(c: &mut Criterion) {
    let records = generate_records(RECORDS);
    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    let mut group = c.benchmark_group("filter_single");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("by_protocol", |b| {
        b.iter(|| by_protocol(black_box(&records), "nfs").len());
    });

    group.bench_function("by_operation", |b| {
        b.iter(|| by_operation(black_box(&records), "nfs", "write").len());
    });

    // Binary-searched ranges should be independent of capture size.
    group.bench_function("by_index_range_narrow", |b| {
        b.iter(|| by_index_range(black_box(&records), 50_000, 50_100).len());
    });

    group.bench_function("by_time_range_narrow", |b| {
        let start = base + chrono::Duration::seconds(30);
        let end = start + chrono::Duration::milliseconds(250);
        b.iter(|| by_time_range(black_box(&records), start, end).len());
    });

    group.finish();
}

fn bench_conjunction(c: &mut Criterion) {
    let records = generate_records(RECORDS);
    let query = Query::new()
        .and(Predicate::IndexRange {
            lo: 10_000,
            hi: 60_000,
        })
        .and(Predicate::Protocol {
            name: "http".into(),
        })
        .and(Predicate::Operation {
            protocol: None,
            operation: "get".into(),
        });

    let mut group = c.benchmark_group("filter_conjunction");
    group.sample_size(50);

    group.bench_function("range_protocol_operation", |b| {
        b.iter(|| query.apply(black_box(&records)).len());
    });

    group.bench_function("count_only", |b| {
        b.iter(|| query.count(black_box(&records)));
    });

    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let records = generate_records(RECORDS);
    c.bench_function("capture_summary_100k", |b| {
        b.iter(|| CaptureSummary::from_records(black_box(&records)).total_packets);
    });
}

criterion_group!(benches, bench_single_predicates, bench_conjunction, bench_summary);
criterion_main!(benches);
