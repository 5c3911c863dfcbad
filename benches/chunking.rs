use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use voice_rag::embeddings::{ChunkingConfig, split_text};

fn sample_document() -> String {
    let paragraph = "The charger ships with a USB-C cable. Plug it into any outlet rated \
        for 100 to 240 volts. The status light turns green when the battery is full, \
        and blinks amber while charging.\nIf the light stays red, unplug the device.";
    (0..400)
        .map(|i| format!("Section {}\n{}", i, paragraph))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("split_text", |b| {
        b.iter(|| split_text(black_box(&document), black_box(&config)))
    });

    let unbroken = "word ".repeat(50_000);
    c.bench_function("split_text_words_only", |b| {
        b.iter(|| split_text(black_box(&unbroken), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
