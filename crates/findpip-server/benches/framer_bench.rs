// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for message framing and request parsing in the
// findpip-server crate.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use findpip_server::{MessageFramer, parse_request};

/// A long request: URL, every directive, and padding the parser has to skip.
fn long_request() -> Vec<u8> {
    let mut message = String::from("https://example.org/scans/2026/recipes/box-3/drawer-1.tiff");
    for _ in 0..50 {
        message.push_str("***returncolor***debugfileon***unknownoption");
    }
    message.push_str("~~~");
    message.into_bytes()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Frame the same stream delivered in chunks of various sizes.
fn bench_framing(c: &mut Criterion) {
    let stream = long_request();
    let mut group = c.benchmark_group("frame");
    for size in [1usize, 16, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut framer = MessageFramer::new();
                for chunk in stream.chunks(size) {
                    if let Ok(Some(message)) = framer.push(black_box(chunk)) {
                        return message;
                    }
                }
                String::new()
            });
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let stream = long_request();
    let message = String::from_utf8_lossy(&stream[..stream.len() - 3]).into_owned();
    c.bench_function("parse_request (long)", |b| {
        b.iter(|| black_box(parse_request(black_box(&message))));
    });
}

criterion_group!(benches, bench_framing, bench_parse);
criterion_main!(benches);
