use criterion::{
    criterion_group, criterion_main, BenchmarkId, Criterion, Throughput,
};
use litmatch::{
    table::{Builder, Config},
    Action, Groups, Input, Literal, SchemeKind, Table,
};

use crate::inputs::*;

mod inputs;

const CORPUS_LEN: usize = 1 << 20;

fn count(table: &Table, haystack: &[u8]) -> usize {
    let mut n = 0;
    table
        .scan(&Input::new(haystack), |_| {
            n += 1;
            Action::Continue
        })
        .unwrap();
    n
}

fn schemes() -> Vec<(&'static str, Config)> {
    vec![
        ("hash", Config::new().scheme(Some(SchemeKind::Hash)).packed(false)),
        ("hash-packed", Config::new().scheme(Some(SchemeKind::Hash))),
        ("masked", Config::new().scheme(Some(SchemeKind::Masked))),
    ]
}

fn scan_prose(c: &mut Criterion) {
    let corpus = prose(CORPUS_LEN);
    let mut group = c.benchmark_group("scan-prose");
    group.throughput(Throughput::Bytes(corpus.len() as u64));
    for &size in &[1, 8, 32, 500] {
        let lits: Vec<Literal> = words(size)
            .iter()
            .enumerate()
            .map(|(i, w)| Literal::new(w, i as u32))
            .collect();
        for (name, config) in schemes() {
            let table = match Builder::new().configure(config).build(&lits) {
                Ok(table) => table,
                // The masked scheme does not apply to large sets.
                Err(_) => continue,
            };
            let id = BenchmarkId::new(name, size);
            group.bench_with_input(id, &corpus, |b, corpus| {
                b.iter(|| assert_eq!(0, count(&table, corpus)));
            });
        }
    }
    group.finish();
}

fn scan_flood(c: &mut Criterion) {
    let corpus = flood(b'a', CORPUS_LEN);
    let lits = [Literal::new("aaaa", 0), Literal::new("needle", 1)];
    let mut group = c.benchmark_group("scan-flood");
    group.throughput(Throughput::Bytes(corpus.len() as u64));
    for &guard in &[true, false] {
        let table = Builder::new()
            .configure(Config::new().floodguard(guard))
            .build(&lits)
            .unwrap();
        let id = BenchmarkId::new("floodguard", guard);
        group.bench_with_input(id, &corpus, |b, corpus| {
            b.iter(|| assert_eq!(CORPUS_LEN - 3, count(&table, corpus)));
        });
    }
    group.finish();
}

fn scan_stream(c: &mut Criterion) {
    let corpus = prose(CORPUS_LEN);
    let lits = [Literal::new("Sherlock", 0), Literal::new("Adler", 1)];
    let table = Table::new(&lits).unwrap();
    let mut group = c.benchmark_group("scan-stream");
    group.throughput(Throughput::Bytes(corpus.len() as u64));
    for &chunk in &[64, 4096] {
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk),
            &corpus,
            |b, corpus| {
                b.iter(|| {
                    let mut state = table.open_stream();
                    let mut n = 0;
                    for piece in corpus.chunks(chunk) {
                        table
                            .scan_stream(&mut state, piece, Groups::ALL, |_| {
                                n += 1;
                                Action::Continue
                            })
                            .unwrap();
                    }
                    n
                });
            },
        );
    }
    group.finish();
}

fn build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &size in &[8, 1000] {
        let lits: Vec<Literal> = words(size)
            .iter()
            .enumerate()
            .map(|(i, w)| Literal::new(w, i as u32))
            .collect();
        let id = BenchmarkId::new("words", size);
        group.bench_with_input(id, &lits, |b, lits| {
            b.iter(|| Table::new(lits).unwrap());
        });
    }
    group.finish();
}

criterion_group!(g1, scan_prose);
criterion_group!(g2, scan_flood);
criterion_group!(g3, scan_stream);
criterion_group!(g4, build);
criterion_main!(g1, g2, g3, g4);
