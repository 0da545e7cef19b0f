//! Benchmarks for store parsing and serialization.

use std::collections::BTreeMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use marginalia::document::TextEdit;
use marginalia::highlight::{PenStyle, Span, SpanTracker};
use marginalia::store::parse;

fn synthetic_store(sources: usize, entries_per_source: usize) -> String {
    let mut out = String::from("Shared notes.\n\n");
    for s in 0..sources {
        out.push_str(&format!(
            "* Source {s}\n:PROPERTIES:\n:source: /data/source-{s}.txt\n:END:\n"
        ));
        for e in 0..entries_per_source {
            let beg = e * 40;
            let end = beg + 12;
            out.push_str(&format!(
                "** excerpt {s}-{e}\n:PROPERTIES:\n:id: {s:04}{e:04}\n:beg: {beg}\n:end: {end}\n:label: yellow\n:END:\nAnnotation line one.\nAnnotation line two.\n"
            ));
        }
    }
    out
}

fn bench_parse_small(c: &mut Criterion) {
    let text = synthetic_store(1, 10);
    c.bench_function("parse_small", |b| b.iter(|| parse(black_box(&text))));
}

fn bench_parse_large(c: &mut Criterion) {
    let text = synthetic_store(20, 50);
    c.bench_function("parse_large", |b| b.iter(|| parse(black_box(&text))));
}

fn bench_serialize_large(c: &mut Criterion) {
    let doc = parse(&synthetic_store(20, 50));
    c.bench_function("serialize_large", |b| b.iter(|| black_box(&doc).serialize()));
}

fn bench_tracker_edit(c: &mut Criterion) {
    let mut tracker = SpanTracker::new();
    for i in 0..1_000 {
        let beg = i * 20;
        tracker.create(Span::new(beg, beg + 10), None, PenStyle::default(), BTreeMap::new(), None);
    }
    // Same edit applied over and over: the spans drift right but the work
    // per iteration is identical.
    let edit = TextEdit::insertion(0, 1);
    c.bench_function("tracker_edit_1000_spans", |b| {
        b.iter(|| tracker.apply_edit(black_box(&edit)));
    });
}

criterion_group!(
    benches,
    bench_parse_small,
    bench_parse_large,
    bench_serialize_large,
    bench_tracker_edit
);
criterion_main!(benches);
