use criterion::{black_box, criterion_group, criterion_main, Criterion};
use condense_core::coverage::{ChromosomeProfile, SampleEvents};
use condense_core::Fragment;
use std::convert::Infallible;

const CHROM_LEN: i64 = 1_000_000;

fn generate_fragments(count: usize, stride: i64) -> Vec<Fragment> {
    (0..count as i64)
        .map(|i| {
            let start = (i * stride) % (CHROM_LEN - 200);
            Fragment::new("chr1", start, start + 147 + (i % 24))
        })
        .collect()
}

fn build_profile(samples: usize, fragments: &[Fragment]) -> ChromosomeProfile {
    let mut profile = ChromosomeProfile::new(samples);
    for sample in 0..samples {
        let mut events = SampleEvents::new();
        for fragment in fragments {
            events.add_fragment(fragment.clone());
        }
        profile.merge_sample(sample, events).unwrap();
    }
    profile
}

fn bench_accumulate(c: &mut Criterion) {
    let fragments = generate_fragments(100_000, 37);

    c.bench_function("accumulate_100k_fragments", |b| {
        b.iter(|| black_box(build_profile(2, black_box(&fragments))))
    });
}

fn bench_dense_sweep(c: &mut Criterion) {
    let profile = build_profile(3, &generate_fragments(100_000, 37));

    c.bench_function("sweep_dense_1mb", |b| {
        b.iter(|| {
            let mut total = 0i64;
            profile
                .sweep("chr1", CHROM_LEN, false, |_, depth| {
                    total += depth[0];
                    Ok::<_, Infallible>(())
                })
                .unwrap();
            black_box(total)
        })
    });
}

fn bench_sparse_sweep(c: &mut Criterion) {
    // Widely spaced fragments leave long zero stretches to jump over
    let profile = build_profile(3, &generate_fragments(2_000, 4_999));

    c.bench_function("sweep_skip_zero_sparse", |b| {
        b.iter(|| {
            let mut rows = 0u64;
            profile
                .sweep("chr1", CHROM_LEN, true, |_, _| {
                    rows += 1;
                    Ok::<_, Infallible>(())
                })
                .unwrap();
            black_box(rows)
        })
    });
}

criterion_group!(benches, bench_accumulate, bench_dense_sweep, bench_sparse_sweep);
criterion_main!(benches);
