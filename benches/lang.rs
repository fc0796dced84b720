use std::{fs, io};

use criterion::{criterion_group, criterion_main, Criterion};
use lox_common::error::ErrorS;
use lox_interpreter::Interpreter;

pub fn lang(c: &mut Criterion) {
    let mut paths = fs::read_dir("res/benchmarks")
        .expect("could not read benchmarks directory")
        .map(|entry| entry.expect("could not read directory entry").path())
        .collect::<Vec<_>>();
    paths.sort();

    for path in paths {
        let source = fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("could not read benchmark file: {}", path.display()));
        let name = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("unknown");
        c.bench_function(name, |b| {
            b.iter(|| {
                let mut interpreter = Interpreter::new(io::sink());
                let mut errors: Vec<ErrorS> = Vec::new();
                lox_interpreter::run(&mut interpreter, &source, &mut errors);
                assert!(errors.is_empty(), "benchmark failed: {errors:?}");
            })
        });
    }
}

criterion_group!(benches, lang);
criterion_main!(benches);
