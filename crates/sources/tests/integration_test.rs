//! Integration tests for the recommendation sources.
//!
//! These tests run all three sources against one small but realistic
//! dataset and check the properties every source must share.

use data_loader::{Business, InteractionMatrix, RatingRecord, Review};
use sources::{
    ContentProfileBuilder, HashingEmbedder, LatentFactorModel, LexiconSentiment, NeighborhoodCF,
    RecommendationSource, SvdConfig,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Two taste clusters: pizza lovers (u0..u4) and sushi lovers (u5..u9)
fn create_test_setup() -> (Vec<RatingRecord>, Vec<Business>, Vec<Review>) {
    let pizza = ["p1", "p2", "p3", "p4"];
    let sushi = ["s1", "s2", "s3", "s4"];

    let mut ratings = Vec::new();
    for u in 0..10 {
        let user = format!("u{}", u);
        let (liked, other) = if u < 5 { (pizza, sushi) } else { (sushi, pizza) };
        for (k, item) in liked.iter().enumerate() {
            // each user skips one liked item so there is something to recommend
            if k != u % 4 {
                ratings.push(RatingRecord::new(user.clone(), *item, 4.0 + (k % 2) as f64));
            }
        }
        ratings.push(RatingRecord::new(user.clone(), other[u % 4], 1.0));
    }

    let mut businesses = Vec::new();
    let mut reviews = Vec::new();
    for item in pizza {
        businesses.push(Business::new(item, format!("Pizzeria {}", item)));
        reviews.push(Review::new(item, "great pizza with crispy crust"));
        reviews.push(Review::new(item, "cheesy slices, friendly staff"));
    }
    for item in sushi {
        businesses.push(Business::new(item, format!("Sushi bar {}", item)));
        reviews.push(Review::new(item, "fresh salmon nigiri"));
        reviews.push(Review::new(item, "miso soup was cold"));
    }
    (ratings, businesses, reviews)
}

#[test]
fn test_collaborative_sources_never_recommend_rated_items() {
    let (ratings, _, _) = create_test_setup();
    let matrix = Arc::new(InteractionMatrix::build(&ratings).unwrap());
    let cf = NeighborhoodCF::new(matrix.clone());
    let model = LatentFactorModel::train(&matrix, &SvdConfig::default().with_n_factors(2)).unwrap();

    for user in matrix.user_ids() {
        let u = matrix.user_index(user).unwrap();
        let rated: HashSet<usize> = matrix.row(u).columns().iter().copied().collect();

        let by_cf = cf.recommend(user, 10, 5).unwrap();
        let by_svd = model.recommend(&matrix, user, 10).unwrap();
        for rec in by_cf.iter().chain(by_svd.iter()) {
            let i = matrix.item_index(&rec.item_id).unwrap();
            assert!(!rated.contains(&i), "{} already rated {}", user, rec.item_id);
        }
        assert!(by_cf.iter().all(|r| r.source == RecommendationSource::Neighborhood));
        assert!(by_svd.iter().all(|r| r.source == RecommendationSource::LatentFactor));
    }
}

#[test]
fn test_collaborative_sources_follow_taste_clusters() {
    let (ratings, _, _) = create_test_setup();
    let matrix = Arc::new(InteractionMatrix::build(&ratings).unwrap());

    // u0 skipped p1 (k = 0) and is a pizza lover
    let cf = NeighborhoodCF::new(matrix.clone());
    let top = cf.recommend("u0", 1, 4).unwrap();
    assert_eq!(top[0].item_id, "p1");

    let model = LatentFactorModel::train(&matrix, &SvdConfig::default().with_n_factors(2)).unwrap();
    let top = model.recommend(&matrix, "u0", 1).unwrap();
    assert_eq!(top[0].item_id, "p1");
}

#[test]
fn test_content_source_groups_similar_businesses() {
    let (_, businesses, reviews) = create_test_setup();
    let builder = ContentProfileBuilder::new(
        Arc::new(HashingEmbedder::default()),
        Arc::new(LexiconSentiment::new()),
    );
    let profiles = builder.build(&businesses, &reviews).unwrap();
    assert_eq!(profiles.len(), 8);
    assert_eq!(profiles.dimension(), 385);

    let similar = profiles.recommend_similar("p1", 3).unwrap();
    let ids: Vec<&str> = similar.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p3", "p4"]);
}

#[test]
fn test_repeated_queries_are_identical() {
    let (ratings, _, _) = create_test_setup();
    let matrix = Arc::new(InteractionMatrix::build(&ratings).unwrap());
    let cf = NeighborhoodCF::new(matrix.clone());
    assert_eq!(cf.recommend("u7", 5, 3).unwrap(), cf.recommend("u7", 5, 3).unwrap());

    let config = SvdConfig::default().with_n_factors(3).with_seed(7);
    let a = LatentFactorModel::train(&matrix, &config).unwrap();
    let b = LatentFactorModel::train(&matrix, &config).unwrap();
    assert_eq!(a.recommend(&matrix, "u7", 5).unwrap(), b.recommend(&matrix, "u7", 5).unwrap());
}
