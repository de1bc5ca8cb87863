//! Candidate models searched by the baseline engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::features::squared_distance;
use crate::error::{PortError, PortResult};
use crate::rng::SimpleRng;

const KNN_K: usize = 5;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Majority,
    NearestCentroid,
    Knn,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 3] = [
        ClassifierKind::Majority,
        ClassifierKind::NearestCentroid,
        ClassifierKind::Knn,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ClassifierKind::Majority => "Majority Class",
            ClassifierKind::NearestCentroid => "Nearest Centroid",
            ClassifierKind::Knn => "K Neighbors Classifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Majority {
        label: String,
        share: f64,
    },
    NearestCentroid {
        labels: Vec<String>,
        centroids: Vec<Vec<f64>>,
    },
    Knn {
        k: usize,
        points: Vec<Vec<f64>>,
        labels: Vec<String>,
    },
}

impl Classifier {
    /// `x` and `y` must be non-empty and of equal length.
    pub fn fit(kind: ClassifierKind, x: &[Vec<f64>], y: &[String]) -> Classifier {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in y {
            *counts.entry(label.as_str()).or_default() += 1;
        }

        match kind {
            ClassifierKind::Majority => {
                let (label, n) = counts
                    .iter()
                    .fold(("", 0usize), |best, (l, &n)| if n > best.1 { (*l, n) } else { best });
                Classifier::Majority {
                    label: label.to_string(),
                    share: n as f64 / y.len().max(1) as f64,
                }
            }
            ClassifierKind::NearestCentroid => {
                let dim = x.first().map(Vec::len).unwrap_or(0);
                let labels: Vec<String> = counts.keys().map(|l| l.to_string()).collect();
                let centroids = labels
                    .iter()
                    .map(|label| {
                        let mut sum = vec![0.0; dim];
                        let mut n = 0.0;
                        for (row, _) in x.iter().zip(y).filter(|(_, l)| *l == label) {
                            for (s, v) in sum.iter_mut().zip(row) {
                                *s += v;
                            }
                            n += 1.0;
                        }
                        sum.into_iter().map(|s| s / n).collect()
                    })
                    .collect();
                Classifier::NearestCentroid { labels, centroids }
            }
            ClassifierKind::Knn => Classifier::Knn {
                k: KNN_K.min(x.len()),
                points: x.to_vec(),
                labels: y.to_vec(),
            },
        }
    }

    /// Predicted label with a confidence in `[0, 1]`.
    pub fn predict(&self, row: &[f64]) -> (String, f64) {
        match self {
            Classifier::Majority { label, share } => (label.clone(), *share),
            Classifier::NearestCentroid { labels, centroids } => {
                let weights: Vec<f64> = centroids
                    .iter()
                    .map(|c| 1.0 / (squared_distance(row, c).sqrt() + 1e-9))
                    .collect();
                let total: f64 = weights.iter().sum();
                let best = argmax(&weights);
                (labels[best].clone(), weights[best] / total)
            }
            Classifier::Knn { k, points, labels } => {
                let nearest = nearest_indices(points, row, *k);
                let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
                for &i in &nearest {
                    *votes.entry(labels[i].as_str()).or_default() += 1;
                }
                let (label, n) = votes
                    .iter()
                    .fold(("", 0usize), |best, (l, &n)| if n > best.1 { (*l, n) } else { best });
                (label.to_string(), n as f64 / nearest.len().max(1) as f64)
            }
        }
    }
}

pub fn accuracy(actual: &[String], predicted: &[String]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let hits = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
    hits as f64 / actual.len() as f64
}

/// Unweighted mean of per-class F1 over the classes in `actual`.
pub fn macro_f1(actual: &[String], predicted: &[String]) -> f64 {
    let mut classes: Vec<&String> = actual.iter().collect();
    classes.sort();
    classes.dedup();
    if classes.is_empty() {
        return 0.0;
    }
    let f1s: f64 = classes
        .iter()
        .map(|c| {
            let tp = actual.iter().zip(predicted).filter(|(a, p)| a == c && p == c).count() as f64;
            let fp = actual.iter().zip(predicted).filter(|(a, p)| a != c && p == c).count() as f64;
            let fn_ = actual.iter().zip(predicted).filter(|(a, p)| a == c && p != c).count() as f64;
            if tp == 0.0 {
                0.0
            } else {
                2.0 * tp / (2.0 * tp + fp + fn_)
            }
        })
        .sum();
    f1s / classes.len() as f64
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressorKind {
    Mean,
    Linear,
    Knn,
}

impl RegressorKind {
    pub const ALL: [RegressorKind; 3] =
        [RegressorKind::Mean, RegressorKind::Linear, RegressorKind::Knn];

    pub fn label(self) -> &'static str {
        match self {
            RegressorKind::Mean => "Dummy Regressor",
            RegressorKind::Linear => "Linear Regression",
            RegressorKind::Knn => "K Neighbors Regressor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    Mean {
        value: f64,
    },
    Linear {
        intercept: f64,
        weights: Vec<f64>,
    },
    Knn {
        k: usize,
        points: Vec<Vec<f64>>,
        targets: Vec<f64>,
    },
}

impl Regressor {
    pub fn fit(kind: RegressorKind, x: &[Vec<f64>], y: &[f64]) -> Regressor {
        let mean = y.iter().sum::<f64>() / y.len().max(1) as f64;
        match kind {
            RegressorKind::Mean => Regressor::Mean { value: mean },
            RegressorKind::Linear => match least_squares(x, y) {
                Some(mut coef) => {
                    let intercept = coef.remove(0);
                    Regressor::Linear {
                        intercept,
                        weights: coef,
                    }
                }
                // Singular system: fall back to the intercept-only model.
                None => Regressor::Linear {
                    intercept: mean,
                    weights: vec![0.0; x.first().map(Vec::len).unwrap_or(0)],
                },
            },
            RegressorKind::Knn => Regressor::Knn {
                k: KNN_K.min(x.len()),
                points: x.to_vec(),
                targets: y.to_vec(),
            },
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Regressor::Mean { value } => *value,
            Regressor::Linear { intercept, weights } => {
                intercept + weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>()
            }
            Regressor::Knn { k, points, targets } => {
                let nearest = nearest_indices(points, row, *k);
                nearest.iter().map(|&i| targets[i]).sum::<f64>() / nearest.len().max(1) as f64
            }
        }
    }
}

/// Ridge-stabilised normal equations with a leading intercept term.
fn least_squares(x: &[Vec<f64>], y: &[f64]) -> Option<Vec<f64>> {
    let dim = x.first().map(Vec::len)? + 1;
    let mut a = vec![vec![0.0; dim + 1]; dim];
    for (row, &target) in x.iter().zip(y) {
        let mut aug = Vec::with_capacity(dim);
        aug.push(1.0);
        aug.extend_from_slice(row);
        for i in 0..dim {
            for j in 0..dim {
                a[i][j] += aug[i] * aug[j];
            }
            a[i][dim] += aug[i] * target;
        }
    }
    for (i, row) in a.iter_mut().enumerate().skip(1) {
        row[i] += 1e-6;
    }
    solve(a)
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
fn solve(mut a: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let n = a.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..=n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    let mut out = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|j| a[i][j] * out[j]).sum();
        out[i] = (a[i][n] - tail) / a[i][i];
    }
    Some(out)
}

pub struct RegressionScores {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

pub fn regression_scores(actual: &[f64], predicted: &[f64]) -> RegressionScores {
    let n = actual.len().max(1) as f64;
    let mae = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let sse: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let mean = actual.iter().sum::<f64>() / n;
    let sst: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    RegressionScores {
        mae,
        rmse: (sse / n).sqrt(),
        r2: if sst > 0.0 { 1.0 - sse / sst } else { 0.0 },
    }
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
}

impl KMeans {
    /// Lloyd iterations from a k-means++ start. Requires `x.len() >= k >= 1`.
    pub fn fit(x: &[Vec<f64>], k: usize, seed: u64) -> PortResult<KMeans> {
        if k == 0 || x.len() < k {
            return Err(PortError::InvalidConfiguration(format!(
                "cannot form {k} clusters from {} rows",
                x.len()
            )));
        }
        let mut rng = SimpleRng::new(seed);
        let mut centroids = vec![x[rng.below(x.len())].clone()];
        while centroids.len() < k {
            let d2: Vec<f64> = x
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| squared_distance(p, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = d2.iter().sum();
            let next = if total <= 0.0 {
                rng.below(x.len())
            } else {
                let mut target = rng.next_f64() * total;
                d2.iter()
                    .position(|&d| {
                        target -= d;
                        target <= 0.0
                    })
                    .unwrap_or(x.len() - 1)
            };
            centroids.push(x[next].clone());
        }

        let mut model = KMeans { centroids };
        let mut assignments = model.assign_all(x);
        for _ in 0..100 {
            model.recenter(x, &assignments);
            let next = model.assign_all(x);
            if next == assignments {
                break;
            }
            assignments = next;
        }
        Ok(model)
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn assign(&self, row: &[f64]) -> usize {
        let d: Vec<f64> = self.centroids.iter().map(|c| -squared_distance(row, c)).collect();
        argmax(&d)
    }

    pub fn assign_all(&self, x: &[Vec<f64>]) -> Vec<usize> {
        x.iter().map(|r| self.assign(r)).collect()
    }

    fn recenter(&mut self, x: &[Vec<f64>], assignments: &[usize]) {
        for (c, centroid) in self.centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = x
                .iter()
                .zip(assignments)
                .filter(|&(_, &a)| a == c)
                .map(|(r, _)| r)
                .collect();
            // An emptied cluster keeps its previous centre.
            if members.is_empty() {
                continue;
            }
            for (j, v) in centroid.iter_mut().enumerate() {
                *v = members.iter().map(|m| m[j]).sum::<f64>() / members.len() as f64;
            }
        }
    }

    pub fn inertia(&self, x: &[Vec<f64>]) -> f64 {
        x.iter()
            .map(|r| squared_distance(r, &self.centroids[self.assign(r)]))
            .sum()
    }
}

/// Mean silhouette coefficient; zero when fewer than two clusters are populated.
pub fn silhouette(x: &[Vec<f64>], assignments: &[usize], k: usize) -> f64 {
    let populated = (0..k).filter(|c| assignments.contains(c)).count();
    if populated < 2 {
        return 0.0;
    }
    let scores: Vec<f64> = x
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for (j, other) in x.iter().enumerate() {
                if i == j {
                    continue;
                }
                sums[assignments[j]] += squared_distance(row, other).sqrt();
                counts[assignments[j]] += 1;
            }
            let own = assignments[i];
            if counts[own] == 0 {
                return 0.0;
            }
            let a = sums[own] / counts[own] as f64;
            let b = (0..k)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| sums[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 { (b - a) / denom } else { 0.0 }
        })
        .collect();
    scores.iter().sum::<f64>() / scores.len() as f64
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

fn nearest_indices(points: &[Vec<f64>], row: &[f64], k: usize) -> Vec<usize> {
    let mut d: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, squared_distance(p, row)))
        .collect();
    d.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    d.into_iter().take(k).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn centroid_classifier_separates_clusters() {
        let x = vec![vec![0.0], vec![0.2], vec![5.0], vec![5.2]];
        let y = labels(&["lo", "lo", "hi", "hi"]);
        let model = Classifier::fit(ClassifierKind::NearestCentroid, &x, &y);
        assert_eq!(model.predict(&[0.1]).0, "lo");
        let (label, score) = model.predict(&[4.9]);
        assert_eq!(label, "hi");
        assert!(score > 0.5);
    }

    #[test]
    fn majority_predicts_most_frequent() {
        let x = vec![vec![0.0]; 3];
        let model = Classifier::fit(ClassifierKind::Majority, &x, &labels(&["a", "b", "b"]));
        assert_eq!(model.predict(&[9.0]), ("b".to_string(), 2.0 / 3.0));
    }

    #[test]
    fn linear_regression_recovers_a_line() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let model = Regressor::fit(RegressorKind::Linear, &x, &y);
        assert!((model.predict(&[20.0]) - 43.0).abs() < 1e-3);
    }

    #[test]
    fn regression_scores_are_exact_for_perfect_fit() {
        let s = regression_scores(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(s.mae, 0.0);
        assert_eq!(s.rmse, 0.0);
        assert_eq!(s.r2, 1.0);
    }

    #[test]
    fn kmeans_finds_two_groups() {
        let x = vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![10.0, 10.0], vec![10.1, 10.0]];
        let model = KMeans::fit(&x, 2, 123).unwrap();
        let a = model.assign_all(&x);
        assert_eq!(a[0], a[1]);
        assert_eq!(a[2], a[3]);
        assert_ne!(a[0], a[2]);
        assert!(silhouette(&x, &a, 2) > 0.9);
    }

    #[test]
    fn kmeans_needs_enough_rows() {
        assert!(KMeans::fit(&[vec![1.0]], 3, 1).is_err());
    }

    #[test]
    fn macro_f1_penalises_missed_class() {
        let actual = labels(&["a", "a", "b", "b"]);
        assert_eq!(macro_f1(&actual, &actual), 1.0);
        let all_a = labels(&["a", "a", "a", "a"]);
        assert!(macro_f1(&actual, &all_a) < 0.5);
    }
}
