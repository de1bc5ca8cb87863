//! Feature extraction: numeric columns, mean imputation, z-scores.

use serde::{Deserialize, Serialize};

use crate::data::summary::numeric_stats;
use crate::data::TabularDataset;
use crate::error::{PortError, PortResult};
use crate::rng::SimpleRng;

/// Columns and scaling learnt from the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpace {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl FeatureSpace {
    /// Every numeric column except `exclude`.
    pub fn fit(dataset: &TabularDataset, exclude: Option<&str>) -> PortResult<Self> {
        let mut columns = Vec::new();
        let mut means = Vec::new();
        let mut scales = Vec::new();

        for col in dataset.columns() {
            if Some(col.name.as_str()) == exclude || !col.column_type().is_numeric() {
                continue;
            }
            let Some(stats) = numeric_stats(col.as_f64().into_iter().flatten()) else {
                continue;
            };
            columns.push(col.name.clone());
            means.push(stats.mean);
            scales.push(if stats.std > f64::EPSILON { stats.std } else { 1.0 });
        }

        if columns.is_empty() {
            return Err(PortError::InvalidConfiguration(format!(
                "'{}' has no numeric feature columns",
                dataset.name()
            )));
        }
        Ok(Self {
            columns,
            means,
            scales,
        })
    }

    /// Row-major standardized matrix. Missing cells take the training mean.
    pub fn transform(&self, dataset: &TabularDataset) -> PortResult<Vec<Vec<f64>>> {
        let mut cols = Vec::with_capacity(self.columns.len());
        for name in &self.columns {
            let col = dataset.column(name).ok_or_else(|| {
                PortError::InvalidConfiguration(format!(
                    "feature column '{name}' is missing from '{}'",
                    dataset.name()
                ))
            })?;
            cols.push(col.as_f64());
        }

        let rows = (0..dataset.n_rows())
            .map(|r| {
                cols.iter()
                    .enumerate()
                    .map(|(j, col)| {
                        let raw = col[r].unwrap_or(self.means[j]);
                        (raw - self.means[j]) / self.scales[j]
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }
}

/// Deterministic 80/20 holdout. Tiny datasets train and test on everything.
pub fn holdout(n: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    if n < 5 {
        return (idx.clone(), idx);
    }
    SimpleRng::new(seed).shuffle(&mut idx);
    let n_test = ((n as f64) * 0.2).round().max(1.0) as usize;
    let test = idx[..n_test].to_vec();
    let train = idx[n_test..].to_vec();
    (train, test)
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
