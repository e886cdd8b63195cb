//! Fingerprint, wire-encoding and chunking throughput benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use udf_registry_core::content::{decode_from_wire, encode_for_wire};
use udf_registry_core::transfer::{reassemble, upload_plan};
use udf_registry_core::HashAlgorithm;

const SIZES: [usize; 3] = [1024, 64 * 1024, 1024 * 1024];

fn module_source(size: usize) -> Vec<u8> {
    b"function apply(rec, bin, value)\n  rec[bin] = value\n  kv:update(rec)\nend\n"
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect()
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for size in SIZES {
        let content = module_source(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("sha1", size), &content, |b, content| {
            b.iter(|| black_box(HashAlgorithm::Sha1.fingerprint(content)))
        });
        group.bench_with_input(BenchmarkId::new("sha256", size), &content, |b, content| {
            b.iter(|| black_box(HashAlgorithm::Sha256.fingerprint(content)))
        });
    }

    group.finish();
}

fn bench_wire_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire_encoding");

    for size in SIZES {
        let content = module_source(size);
        let encoded = encode_for_wire(&content);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &content, |b, content| {
            b.iter(|| black_box(encode_for_wire(content)))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_from_wire(encoded).unwrap()))
        });
    }

    group.finish();
}

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    let content = Bytes::from(module_source(4 * 1024 * 1024));
    group.throughput(Throughput::Bytes(content.len() as u64));

    for chunk_size in [64 * 1024, 1024 * 1024] {
        let chunks = upload_plan(&content, chunk_size).unwrap();

        group.bench_with_input(
            BenchmarkId::new("split", chunk_size),
            &chunk_size,
            |b, &chunk_size| b.iter(|| black_box(upload_plan(&content, chunk_size).unwrap())),
        );
        group.bench_with_input(BenchmarkId::new("reassemble", chunk_size), &chunks, |b, chunks| {
            b.iter(|| black_box(reassemble(chunks).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_wire_encoding, bench_chunking);
criterion_main!(benches);
