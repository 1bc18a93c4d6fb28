//! Offline evaluation of the collaborative recommenders.
//!
//! Ranking metrics use binary relevance: an item is relevant when it is in
//! the held-out set. `evaluate_holdout` hides each user's most recent rating
//! (the last one in input order), trains on the rest and checks whether the
//! hidden item comes back in the top k.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use data_loader::{InteractionMatrix, ItemId, RatingRecord, UserId};
use sources::{LatentFactorModel, NeighborhoodCF, SvdConfig};

/// Root mean squared error of (actual, predicted) pairs; None when empty
pub fn rmse(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let sum: f64 = pairs.iter().map(|(a, p)| (a - p) * (a - p)).sum();
    Some((sum / pairs.len() as f64).sqrt())
}

fn hits_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> usize {
    recommended
        .iter()
        .take(k)
        .filter(|item| relevant.contains(*item))
        .count()
}

/// Relevant items among the first k, divided by k
pub fn precision_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_at_k(recommended, relevant, k) as f64 / k as f64
}

/// Relevant items among the first k, divided by the number of relevant items
pub fn recall_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits_at_k(recommended, relevant, k) as f64 / relevant.len() as f64
}

pub fn f1_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    let p = precision_at_k(recommended, relevant, k);
    let r = recall_at_k(recommended, relevant, k);
    if p + r == 0.0 {
        return 0.0;
    }
    2.0 * p * r / (p + r)
}

/// Normalized discounted cumulative gain with a log2 position discount
pub fn ndcg_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    let dcg: f64 = recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| relevant.contains(*item))
        .map(|(position, _)| 1.0 / (position as f64 + 2.0).log2())
        .sum();
    let idcg: f64 = (0..relevant.len().min(k))
        .map(|position| 1.0 / (position as f64 + 2.0).log2())
        .sum();
    if idcg == 0.0 {
        return 0.0;
    }
    dcg / idcg
}

/// Mean ranking metrics over the evaluated users
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub ndcg: f64,
}

impl RankingMetrics {
    fn of(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> Self {
        Self {
            precision: precision_at_k(recommended, relevant, k),
            recall: recall_at_k(recommended, relevant, k),
            f1: f1_at_k(recommended, relevant, k),
            ndcg: ndcg_at_k(recommended, relevant, k),
        }
    }

    fn mean(all: &[RankingMetrics]) -> Self {
        if all.is_empty() {
            return Self::default();
        }
        let n = all.len() as f64;
        Self {
            precision: all.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: all.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: all.iter().map(|m| m.f1).sum::<f64>() / n,
            ndcg: all.iter().map(|m| m.ndcg).sum::<f64>() / n,
        }
    }
}

/// Hold-out evaluation parameters
#[derive(Debug, Clone)]
pub struct HoldoutConfig {
    pub k: usize,
    pub num_neighbors: usize,
    pub svd: SvdConfig,
}

/// Result of [`evaluate_holdout`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldoutReport {
    pub k: usize,
    pub users_evaluated: usize,
    pub neighborhood: RankingMetrics,
    pub latent_factor: RankingMetrics,
    /// SVD reconstruction error on held-out ratings whose item is still known
    pub latent_factor_rmse: Option<f64>,
}

/// Leave-last-out evaluation of both collaborative recommenders
///
/// Only users with at least two distinct rated items take part. Every record
/// of a held-out (user, item) pair is removed from training.
pub fn evaluate_holdout(records: &[RatingRecord], config: &HoldoutConfig) -> Result<HoldoutReport> {
    let start = Instant::now();
    let (train, held_out) = leave_last_out(records);
    info!(
        "Hold-out split: {} training ratings, {} held-out users",
        train.len(),
        held_out.len()
    );

    let matrix = Arc::new(
        InteractionMatrix::build(&train).context("Failed to build training matrix")?,
    );
    let cf = NeighborhoodCF::new(matrix.clone());
    let model = LatentFactorModel::train(&matrix, &config.svd)
        .context("Failed to train SVD on the training split")?;

    let per_user: Vec<(RankingMetrics, RankingMetrics, Option<(f64, f64)>)> = held_out
        .par_iter()
        .map(|(user_id, item_id, rating)| -> Result<_> {
            let relevant: HashSet<ItemId> = std::iter::once(item_id.clone()).collect();

            let by_cf: Vec<ItemId> = cf
                .recommend(user_id, config.k, config.num_neighbors)?
                .into_iter()
                .map(|r| r.item_id)
                .collect();
            let by_svd: Vec<ItemId> = model
                .recommend(&matrix, user_id, config.k)?
                .into_iter()
                .map(|r| r.item_id)
                .collect();

            let prediction = match (matrix.user_index(user_id), matrix.item_index(item_id)) {
                (Some(u), Some(i)) => Some((*rating, model.predict(u, i))),
                _ => None,
            };
            Ok((
                RankingMetrics::of(&by_cf, &relevant, config.k),
                RankingMetrics::of(&by_svd, &relevant, config.k),
                prediction,
            ))
        })
        .collect::<Result<_>>()?;

    let cf_metrics: Vec<RankingMetrics> = per_user.iter().map(|(m, _, _)| m.clone()).collect();
    let svd_metrics: Vec<RankingMetrics> = per_user.iter().map(|(_, m, _)| m.clone()).collect();
    let predictions: Vec<(f64, f64)> = per_user.iter().filter_map(|(_, _, p)| *p).collect();
    debug!("{} held-out items still present in training", predictions.len());

    let report = HoldoutReport {
        k: config.k,
        users_evaluated: per_user.len(),
        neighborhood: RankingMetrics::mean(&cf_metrics),
        latent_factor: RankingMetrics::mean(&svd_metrics),
        latent_factor_rmse: rmse(&predictions),
    };
    info!("Evaluated {} users in {:?}", report.users_evaluated, start.elapsed());
    Ok(report)
}

/// Split off each eligible user's last-rated item, in first-seen user order
fn leave_last_out(records: &[RatingRecord]) -> (Vec<RatingRecord>, Vec<(UserId, ItemId, f64)>) {
    // user -> (distinct items, last record position)
    let mut users: Vec<&str> = Vec::new();
    let mut seen: HashMap<&str, (HashSet<&str>, usize)> = HashMap::new();
    for (position, record) in records.iter().enumerate() {
        let entry = seen.entry(record.user_id.as_str()).or_insert_with(|| {
            users.push(record.user_id.as_str());
            (HashSet::new(), position)
        });
        entry.0.insert(record.item_id.as_str());
        entry.1 = position;
    }

    let mut held_out = Vec::new();
    let mut hidden: HashSet<(&str, &str)> = HashSet::new();
    for user in users {
        let (items, last) = &seen[user];
        if items.len() < 2 {
            continue;
        }
        let record = &records[*last];
        hidden.insert((user, record.item_id.as_str()));
        held_out.push((record.user_id.clone(), record.item_id.clone(), record.rating));
    }

    let train = records
        .iter()
        .filter(|r| !hidden.contains(&(r.user_id.as_str(), r.item_id.as_str())))
        .cloned()
        .collect();
    (train, held_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<ItemId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> HashSet<ItemId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rmse() {
        let pairs = [(3.0, 2.5), (4.0, 3.5), (5.0, 5.0), (2.0, 2.0)];
        assert!((rmse(&pairs).unwrap() - (0.5f64 / 4.0).sqrt()).abs() < 1e-12);
        assert_eq!(rmse(&[]), None);
    }

    #[test]
    fn test_ranking_metrics() {
        let recommended = ids(&["1", "2", "3", "4", "5"]);
        let relevant = set(&["2", "4", "6"]);

        assert!((precision_at_k(&recommended, &relevant, 3) - 1.0 / 3.0).abs() < 1e-12);
        assert!((recall_at_k(&recommended, &relevant, 3) - 1.0 / 3.0).abs() < 1e-12);
        assert!((f1_at_k(&recommended, &relevant, 3) - 1.0 / 3.0).abs() < 1e-12);

        let dcg = 1.0 / 3f64.log2();
        let idcg = 1.0 + 1.0 / 3f64.log2() + 0.5;
        assert!((ndcg_at_k(&recommended, &relevant, 3) - dcg / idcg).abs() < 1e-12);
    }

    #[test]
    fn test_metric_edge_cases() {
        let recommended = ids(&["a"]);
        assert_eq!(precision_at_k(&recommended, &set(&["a"]), 0), 0.0);
        assert_eq!(recall_at_k(&recommended, &HashSet::new(), 5), 0.0);
        assert_eq!(f1_at_k(&recommended, &set(&["b"]), 1), 0.0);
        assert_eq!(ndcg_at_k(&recommended, &HashSet::new(), 3), 0.0);
        assert_eq!(ndcg_at_k(&recommended, &set(&["a"]), 1), 1.0);
    }

    #[test]
    fn test_leave_last_out() {
        let records = vec![
            RatingRecord::new("u1", "a", 4.0),
            RatingRecord::new("u2", "a", 5.0),
            RatingRecord::new("u1", "b", 3.0),
            RatingRecord::new("u1", "b", 2.0),
            RatingRecord::new("u3", "c", 1.0),
            RatingRecord::new("u3", "c", 2.0),
        ];
        let (train, held_out) = leave_last_out(&records);

        // u2 and u3 have a single distinct item and stay whole
        assert_eq!(held_out, vec![("u1".to_string(), "b".to_string(), 2.0)]);
        assert_eq!(train.len(), 4);
        assert!(train.iter().all(|r| !(r.user_id == "u1" && r.item_id == "b")));
    }

    #[test]
    fn test_evaluate_holdout_runs_end_to_end() {
        let mut records = Vec::new();
        for u in 0..8 {
            for i in 0..6 {
                if (u + i) % 3 != 0 {
                    records.push(RatingRecord::new(
                        format!("u{}", u),
                        format!("i{}", i),
                        1.0 + ((u * i) % 5) as f64,
                    ));
                }
            }
        }
        let config = HoldoutConfig {
            k: 3,
            num_neighbors: 4,
            svd: SvdConfig::default().with_n_factors(2),
        };
        let report = evaluate_holdout(&records, &config).unwrap();

        assert_eq!(report.users_evaluated, 8);
        for metrics in [&report.neighborhood, &report.latent_factor] {
            assert!((0.0..=1.0).contains(&metrics.precision));
            assert!((0.0..=1.0).contains(&metrics.recall));
            assert!((0.0..=1.0).contains(&metrics.ndcg));
        }
        assert!(report.latent_factor_rmse.is_some());
        assert_eq!(report, evaluate_holdout(&records, &config).unwrap());
    }
}
