use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_special_functions(c: &mut Criterion) {
    let xs: Vec<f64> = (0..10_000).map(|i| (i as f64) * 0.001 - 5.0).collect();

    c.bench_function("dawson_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += vid_prob::math::dawson(x);
            }
            black_box(acc)
        })
    });

    c.bench_function("lognormal_pdf_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += vid_prob::lognormal::pdf(x.abs() + 1e-3, 1.0, 0.3).unwrap();
            }
            black_box(acc)
        })
    });

    c.bench_function("normal_interval_mass_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += vid_prob::normal::interval_mass(x, x + 0.01, 0.0, 1.3).unwrap();
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_special_functions);
criterion_main!(benches);
