//! Benchmarks for the stream filter pipeline.
//!
//! - single filters over compressible and incompressible input
//! - a chained `ASCII85Decode` + `FlateDecode` stream, as found in
//!   text-safe files
//! - content-stream tokenizing of a synthetic page

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use pdf_engine::content::parse_content_stream;
use pdf_engine::decoders::{
    DecodeLimits, Filter, decode, decode_stream, encode_ascii85, encode_ascii_hex, encode_flate, encode_lzw,
    encode_run_length,
};
use pdf_engine::object::{Dictionary, Object};

// =============================================================================
// Test Data Generation
// =============================================================================

/// Repeating pattern that compresses well.
fn pattern_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// LCG output, reproducible and hard to compress.
fn noise_bytes(size: usize) -> Vec<u8> {
    let mut seed: u64 = 42;
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            (seed >> 16) as u8
        })
        .collect()
}

/// A page of text and vector drawing operators.
fn content_program(lines: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..lines {
        out.extend_from_slice(
            format!(
                "q 0.5 0 0 rg {} {} 100 20 re f Q BT /F1 12 Tf 72 {} Td (Line {}) Tj ET\n",
                i % 500,
                i % 700,
                720 - (i % 700),
                i
            )
            .as_bytes(),
        );
    }
    out
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_single_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let params = Dictionary::new();

    for size in [4 * 1024, 256 * 1024] {
        for (label, data) in [("pattern", pattern_bytes(size)), ("noise", noise_bytes(size))] {
            group.throughput(Throughput::Bytes(size as u64));
            let cases = [
                (Filter::FlateDecode, encode_flate(&data).unwrap_or_default()),
                (Filter::LZWDecode, encode_lzw(&data).unwrap_or_default()),
                (Filter::ASCII85Decode, encode_ascii85(&data)),
                (Filter::ASCIIHexDecode, encode_ascii_hex(&data)),
                (Filter::RunLengthDecode, encode_run_length(&data)),
            ];
            for (filter, encoded) in cases {
                let id = BenchmarkId::new(format!("{}/{}", filter.name(), label), size);
                group.bench_with_input(id, &encoded, |b, encoded| {
                    b.iter(|| decode(black_box(encoded), filter, &params))
                });
            }
        }
    }
    group.finish();
}

fn bench_filter_chain(c: &mut Criterion) {
    let data = pattern_bytes(512 * 1024);
    let encoded = encode_ascii85(&encode_flate(&data).unwrap_or_default());
    let mut dict = Dictionary::new();
    dict.insert(
        "Filter".to_string(),
        Object::Array(vec![Object::name("ASCII85Decode"), Object::name("FlateDecode")]),
    );
    let limits = DecodeLimits::default();

    let mut group = c.benchmark_group("chain");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("a85_flate_512k", |b| {
        b.iter(|| decode_stream(black_box(&encoded), &dict, &limits))
    });
    group.finish();
}

fn bench_content_parse(c: &mut Criterion) {
    let program = content_program(2000);
    let mut group = c.benchmark_group("content");
    group.throughput(Throughput::Bytes(program.len() as u64));
    group.bench_function("parse_2000_lines", |b| b.iter(|| parse_content_stream(black_box(&program))));
    group.finish();
}

criterion_group!(benches, bench_single_filters, bench_filter_chain, bench_content_parse);
criterion_main!(benches);
