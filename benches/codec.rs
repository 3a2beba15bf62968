//! Benchmarks for the raw HTTP codec
//!
//! Parsing hand-written request text, parsing wire bytes and serializing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rawhttp_harness::fixture::canned::{NOT_FOUND_HTTP_RESPONSE, SUCCESS_HTTP_REQUEST};
use rawhttp_harness::RawMessage;

fn bench_parse_request_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_request_text");

    let test_cases = vec![
        ("canned", SUCCESS_HTTP_REQUEST.to_string()),
        ("lf_endings", SUCCESS_HTTP_REQUEST.replace("\r\n", "\n")),
        (
            "absolute_target",
            "GET http://localhost:8083/saysomething?x=1 HTTP/1.1".to_string(),
        ),
        (
            "many_headers",
            (0..50).fold(SUCCESS_HTTP_REQUEST.to_string(), |acc, i| {
                format!("{acc}\r\nX-Header-{i}: value-{i}")
            }),
        ),
    ];

    for (name, input) in &test_cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| RawMessage::parse_request_text(black_box(input)));
        });
    }

    group.finish();
}

fn bench_wire_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire_format");

    let bytes = NOT_FOUND_HTTP_RESPONSE.as_bytes();
    group.bench_function("from_bytes", |b| {
        b.iter(|| RawMessage::from_bytes(black_box(bytes)));
    });

    if let Ok(message) = RawMessage::from_bytes(bytes) {
        group.bench_function("to_bytes", |b| {
            b.iter(|| black_box(&message).to_bytes());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_request_text, bench_wire_format);
criterion_main!(benches);
