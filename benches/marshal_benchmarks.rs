//! Buffer negotiation and record decoding performance benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use rasinterop::marshal::buffer::CountedCallParams;
use rasinterop::marshal::negotiate::{self, RetryPolicy};
use rasinterop::marshal::records::{FixedRecord, RecordSeq};
use rasinterop::native::status::{ERROR_BUFFER_TOO_SMALL, SUCCESS};
use rasinterop::native::types::ConnectionRecord;
use rasinterop::native::RasHandle;
use rasinterop::native::types::DeviceKind;

/// Fill a byte vector with `count` encoded connection records
fn encoded_connections(count: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(count * ConnectionRecord::SIZE);
    for i in 0..count {
        let record = ConnectionRecord {
            handle: RasHandle(i as u64 + 1),
            entry_name: format!("Entry {i}"),
            device_kind: DeviceKind::Vpn,
            device_name: "WAN Miniport".to_string(),
        };
        record.encode(&mut buf).expect("encode");
    }
    buf
}

fn negotiation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("negotiation");

    for count in [1usize, 16, 128] {
        let encoded = encoded_connections(count);

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("enumerate_from_undersized", count),
            &encoded,
            |b, encoded| {
                b.iter(|| {
                    let mut params = CountedCallParams::new();
                    let policy = RetryPolicy::default().with_initial_size(64);
                    negotiate::run(&mut params, &policy, "BenchEnum", |p| {
                        if p.allocated_len() < encoded.len() {
                            p.set_size(encoded.len());
                            return ERROR_BUFFER_TOO_SMALL;
                        }
                        p.as_mut_slice()[..encoded.len()].copy_from_slice(encoded);
                        p.set_size(encoded.len());
                        p.set_count(count as u32);
                        SUCCESS
                    })
                    .expect("negotiate");
                    params.release();
                    black_box(());
                });
            },
        );
    }

    group.finish();
}

fn decoding_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_decoding");

    for count in [1usize, 16, 128] {
        let encoded = encoded_connections(count);
        let mut params = CountedCallParams::new();
        params.reset(encoded.len()).expect("reset");
        params.as_mut_slice().copy_from_slice(&encoded);
        params.set_count(count as u32);
        params.set_size(encoded.len());

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("decode_connection_records", count),
            &params,
            |b, params| {
                b.iter(|| {
                    let seq = RecordSeq::<ConnectionRecord>::from_params(params).expect("seq");
                    let records = seq.collect_all().expect("decode");
                    black_box(records);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, negotiation_benchmark, decoding_benchmark);
criterion_main!(benches);
