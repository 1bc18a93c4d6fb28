//! Benchmarks for the recommendation sources
//!
//! Run with: cargo bench --package sources
//!
//! Uses a synthetic rating matrix so the benchmark does not depend on the
//! processed Yelp files being present.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_loader::{Business, InteractionMatrix, RatingRecord, Review};
use sources::{
    ContentProfileBuilder, HashingEmbedder, LatentFactorModel, LexiconSentiment, NeighborhoodCF,
    SvdConfig,
};
use std::sync::Arc;

const NUM_USERS: usize = 2_000;
const NUM_ITEMS: usize = 500;

/// Roughly 3% dense, deterministic
fn synthetic_ratings() -> Vec<RatingRecord> {
    let mut records = Vec::new();
    for u in 0..NUM_USERS {
        for i in 0..NUM_ITEMS {
            let h = (u * 2_654_435_761 + i * 40_503) % 97;
            if h < 3 {
                let rating = 1.0 + ((u + i) % 5) as f64;
                records.push(RatingRecord::new(format!("u{}", u), format!("b{}", i), rating));
            }
        }
    }
    records
}

fn load_test_matrix() -> Arc<InteractionMatrix> {
    Arc::new(InteractionMatrix::build(&synthetic_ratings()).expect("Failed to build matrix"))
}

fn bench_build_matrix(c: &mut Criterion) {
    let records = synthetic_ratings();

    c.bench_function("interaction_matrix_build", |b| {
        b.iter(|| {
            let matrix = InteractionMatrix::build(black_box(&records)).unwrap();
            black_box(matrix)
        })
    });
}

fn bench_neighborhood(c: &mut Criterion) {
    let matrix = load_test_matrix();
    let cf = NeighborhoodCF::new(matrix);

    c.bench_function("neighborhood_recommend", |b| {
        b.iter(|| {
            let recs = cf.recommend(black_box("u17"), black_box(10), black_box(10)).unwrap();
            black_box(recs)
        })
    });
}

fn bench_svd(c: &mut Criterion) {
    let matrix = load_test_matrix();
    let config = SvdConfig::default();

    let mut group = c.benchmark_group("latent_factor");
    group.sample_size(10);
    group.bench_function("train_20_factors", |b| {
        b.iter(|| {
            let model = LatentFactorModel::train(black_box(&matrix), &config).unwrap();
            black_box(model)
        })
    });

    let model = LatentFactorModel::train(&matrix, &config).expect("Failed to train model");
    group.bench_function("recommend", |b| {
        b.iter(|| {
            let recs = model.recommend(&matrix, black_box("u17"), black_box(10)).unwrap();
            black_box(recs)
        })
    });
    group.finish();
}

fn bench_content(c: &mut Criterion) {
    let businesses: Vec<Business> = (0..NUM_ITEMS)
        .map(|i| Business::new(format!("b{}", i), format!("Business {}", i)))
        .collect();
    let reviews: Vec<Review> = (0..NUM_ITEMS * 4)
        .map(|k| {
            Review::new(
                format!("b{}", k % NUM_ITEMS),
                format!("review {} of a good place with {} tables", k, k % 13),
            )
        })
        .collect();
    let builder = ContentProfileBuilder::new(
        Arc::new(HashingEmbedder::default()),
        Arc::new(LexiconSentiment::new()),
    );

    c.bench_function("content_profiles_build", |b| {
        b.iter(|| {
            let profiles = builder.build(black_box(&businesses), black_box(&reviews)).unwrap();
            black_box(profiles)
        })
    });

    let profiles = builder.build(&businesses, &reviews).expect("Failed to build profiles");
    c.bench_function("content_recommend_similar", |b| {
        b.iter(|| {
            let recs = profiles.recommend_similar(black_box("b3"), black_box(10)).unwrap();
            black_box(recs)
        })
    });
}

criterion_group!(
    benches,
    bench_build_matrix,
    bench_neighborhood,
    bench_svd,
    bench_content
);
criterion_main!(benches);
