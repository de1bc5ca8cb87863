//! Built-in model-search engine implementing the [`Trainer`] port.
//!
//! Pipeline per task type:
//! ```text
//!   setup    validate target / clusters, fit FeatureSpace
//!     │
//!   search   score every candidate on a seeded 80/20 holdout
//!     │
//!   persist  refit the winner on all rows, save to the artifact slot
//! ```

mod features;
mod models;
mod plots;

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::data::{Column, TabularDataset, Value};
use crate::error::{PortError, PortResult};
use crate::ports::{ImageHandle, Leaderboard, LeaderboardRow, TrainOutput, Trainer};
use crate::task::{PlotKind, TaskType, TrainingConfig};

pub use features::FeatureSpace;
use features::holdout;
use models::{
    Classifier, ClassifierKind, KMeans, Regressor, RegressorKind, accuracy, macro_f1,
    regression_scores, silhouette,
};

/// Value of [`ModelArtifact::engine`] for artifacts written here.
pub const ENGINE: &str = "tabflow-baseline";

pub const PREDICTION_LABEL: &str = "prediction_label";
pub const PREDICTION_SCORE: &str = "prediction_score";
pub const CLUSTER_COLUMN: &str = "Cluster";

/// Largest cluster count on the elbow curve.
const ELBOW_MAX_K: usize = 10;

/// Engine-specific artifact payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "lowercase")]
enum Payload {
    Classification {
        features: FeatureSpace,
        model: Classifier,
        /// Class labels indexing `confusion`.
        classes: Vec<String>,
        /// Holdout counts, `confusion[actual][predicted]`.
        confusion: Vec<Vec<usize>>,
    },
    Regression {
        features: FeatureSpace,
        model: Regressor,
        /// Holdout `(actual, predicted)` pairs.
        holdout: Vec<(f64, f64)>,
    },
    Clustering {
        features: FeatureSpace,
        model: KMeans,
        elbow: Vec<(usize, f64)>,
        sizes: Vec<usize>,
    },
}

pub struct BaselineTrainer {
    store: ArtifactStore,
    plots_dir: PathBuf,
}

impl BaselineTrainer {
    pub fn new(store: ArtifactStore, plots_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            plots_dir: plots_dir.into(),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn decode(artifact: &ModelArtifact) -> PortResult<Payload> {
        if artifact.engine != ENGINE {
            return Err(PortError::InvalidConfiguration(format!(
                "artifact '{}' was produced by engine '{}', not '{ENGINE}'",
                artifact.name, artifact.engine
            )));
        }
        serde_json::from_value(artifact.payload.clone())
            .map_err(|e| {
                PortError::Io(format!("corrupt payload in artifact '{}': {e}", artifact.name))
            })
    }

    // -- setup --

    fn require_target<'a>(
        dataset: &'a TabularDataset,
        config: &TrainingConfig,
    ) -> PortResult<&'a Column> {
        let name = config.target.as_deref().ok_or_else(|| {
            PortError::InvalidConfiguration(format!("{} requires a target column", config.task))
        })?;
        dataset.column(name).ok_or_else(|| {
            PortError::InvalidConfiguration(format!(
                "target '{name}' is not a column of '{}' (columns: {})",
                dataset.name(),
                dataset.column_names().join(", ")
            ))
        })
    }

    /// Rows whose target is present and finite.
    fn labelled_rows(target: &Column) -> Vec<usize> {
        (0..target.len()).filter(|&i| !target.values[i].is_missing()).collect()
    }

    // -- search --

    fn train_classifier(
        &self,
        dataset: &TabularDataset,
        config: &TrainingConfig,
    ) -> PortResult<(Payload, Leaderboard)> {
        let target = Self::require_target(dataset, config)?;
        let features = FeatureSpace::fit(dataset, Some(&target.name))?;
        let rows = Self::labelled_rows(target);
        let all_x = features.transform(dataset)?;
        let x: Vec<Vec<f64>> = rows.iter().map(|&r| all_x[r].clone()).collect();
        let y: Vec<String> = rows.iter().map(|&r| target.values[r].to_string()).collect();

        let mut classes = y.clone();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            return Err(PortError::InvalidConfiguration(format!(
                "target '{}' needs at least two classes, found {}",
                target.name,
                classes.len()
            )));
        }

        let (train_idx, test_idx) = holdout(x.len(), config.seed);
        let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<String>) {
            (
                idx.iter().map(|&i| x[i].clone()).collect(),
                idx.iter().map(|&i| y[i].clone()).collect(),
            )
        };
        let (train_x, train_y) = pick(&train_idx);
        let (test_x, test_y) = pick(&test_idx);

        let mut scored: Vec<(ClassifierKind, f64, f64, Vec<String>)> = ClassifierKind::ALL
            .iter()
            .map(|&kind| {
                let model = Classifier::fit(kind, &train_x, &train_y);
                let predicted: Vec<String> = test_x.iter().map(|r| model.predict(r).0).collect();
                (kind, accuracy(&test_y, &predicted), macro_f1(&test_y, &predicted), predicted)
            })
            .collect();
        // Stable sort keeps candidate order on ties.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let leaderboard = Leaderboard {
            metrics: vec!["Accuracy".into(), "F1".into()],
            rows: scored
                .iter()
                .map(|(kind, acc, f1, _)| LeaderboardRow {
                    model: kind.label().into(),
                    scores: vec![round4(*acc), round4(*f1)],
                })
                .collect(),
        };

        let (best, _, _, best_predicted) = &scored[0];
        let mut confusion = vec![vec![0usize; classes.len()]; classes.len()];
        for (actual, predicted) in test_y.iter().zip(best_predicted) {
            if let (Ok(a), Ok(p)) =
                (classes.binary_search(actual), classes.binary_search(predicted))
            {
                confusion[a][p] += 1;
            }
        }

        let model = Classifier::fit(*best, &x, &y);
        Ok((
            Payload::Classification {
                features,
                model,
                classes,
                confusion,
            },
            leaderboard,
        ))
    }

    fn train_regressor(
        &self,
        dataset: &TabularDataset,
        config: &TrainingConfig,
    ) -> PortResult<(Payload, Leaderboard)> {
        let target = Self::require_target(dataset, config)?;
        if !target.column_type().is_numeric() {
            return Err(PortError::InvalidConfiguration(format!(
                "regression target '{}' must be numeric, found {}",
                target.name,
                target.column_type()
            )));
        }
        let features = FeatureSpace::fit(dataset, Some(&target.name))?;
        let (rows, y): (Vec<usize>, Vec<f64>) = target
            .values
            .iter()
            .enumerate()
            .filter_map(|(r, v)| v.as_f64().map(|y| (r, y)))
            .unzip();
        if rows.len() < 2 {
            return Err(PortError::InvalidConfiguration(format!(
                "target '{}' has fewer than two values",
                target.name
            )));
        }
        let all_x = features.transform(dataset)?;
        let x: Vec<Vec<f64>> = rows.iter().map(|&r| all_x[r].clone()).collect();

        let (train_idx, test_idx) = holdout(x.len(), config.seed);
        let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let train_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let test_y: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();

        let mut scored: Vec<(RegressorKind, models::RegressionScores, Vec<f64>)> =
            RegressorKind::ALL
                .iter()
                .map(|&kind| {
                    let model = Regressor::fit(kind, &train_x, &train_y);
                    let predicted: Vec<f64> =
                        test_idx.iter().map(|&i| model.predict(&x[i])).collect();
                    (kind, regression_scores(&test_y, &predicted), predicted)
                })
                .collect();
        scored.sort_by(|a, b| a.1.rmse.total_cmp(&b.1.rmse));

        let leaderboard = Leaderboard {
            metrics: vec!["MAE".into(), "RMSE".into(), "R2".into()],
            rows: scored
                .iter()
                .map(|(kind, s, _)| LeaderboardRow {
                    model: kind.label().into(),
                    scores: vec![round4(s.mae), round4(s.rmse), round4(s.r2)],
                })
                .collect(),
        };

        let (best, _, best_predicted) = &scored[0];
        let holdout_pairs = test_y.iter().copied().zip(best_predicted.iter().copied()).collect();
        let model = Regressor::fit(*best, &x, &y);
        Ok((
            Payload::Regression {
                features,
                model,
                holdout: holdout_pairs,
            },
            leaderboard,
        ))
    }

    fn train_clusters(
        &self,
        dataset: &TabularDataset,
        config: &TrainingConfig,
    ) -> PortResult<(Payload, Leaderboard, TabularDataset)> {
        if config.clusters < 2 {
            return Err(PortError::InvalidConfiguration(format!(
                "number of clusters must be at least 2, got {}",
                config.clusters
            )));
        }
        let features = FeatureSpace::fit(dataset, None)?;
        let x = features.transform(dataset)?;
        let model = KMeans::fit(&x, config.clusters, config.seed)?;
        let assignments = model.assign_all(&x);

        let mut sizes = vec![0usize; model.k()];
        for &a in &assignments {
            sizes[a] += 1;
        }

        let elbow = (2..=ELBOW_MAX_K.min(x.len()))
            .filter_map(|k| {
                let m = if k == model.k() {
                    model.clone()
                } else {
                    KMeans::fit(&x, k, config.seed).ok()?
                };
                Some((k, round4(m.inertia(&x))))
            })
            .collect();

        let leaderboard = Leaderboard {
            metrics: vec!["Silhouette".into(), "Inertia".into()],
            rows: vec![LeaderboardRow {
                model: "K-Means Clustering".into(),
                scores: vec![
                    round4(silhouette(&x, &assignments, model.k())),
                    round4(model.inertia(&x)),
                ],
            }],
        };

        let column = Column::new(
            CLUSTER_COLUMN,
            assignments
                .iter()
                .map(|a| Value::String(format!("Cluster {a}")))
                .collect(),
        );
        let assigned = dataset
            .with_column(column)
            .map_err(|e| PortError::InvalidConfiguration(e.to_string()))?;

        Ok((
            Payload::Clustering {
                features,
                model,
                elbow,
                sizes,
            },
            leaderboard,
            assigned,
        ))
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl Trainer for BaselineTrainer {
    fn train(
        &self,
        dataset: &TabularDataset,
        config: &TrainingConfig,
        artifact_name: &str,
    ) -> PortResult<TrainOutput> {
        if dataset.is_empty() {
            return Err(PortError::InvalidConfiguration(format!(
                "'{}' has no rows to train on",
                dataset.name()
            )));
        }

        let (payload, leaderboard, assignments) = match config.task {
            TaskType::Classification => {
                let (p, l) = self.train_classifier(dataset, config)?;
                (p, l, None)
            }
            TaskType::Regression => {
                let (p, l) = self.train_regressor(dataset, config)?;
                (p, l, None)
            }
            TaskType::Clustering => {
                let (p, l, a) = self.train_clusters(dataset, config)?;
                (p, l, Some(a))
            }
        };

        let artifact = ModelArtifact {
            name: artifact_name.to_string(),
            task_type: config.task,
            target_column: if config.task.requires_target() { config.target.clone() } else { None },
            engine: ENGINE.to_string(),
            payload: serde_json::to_value(&payload)
                .map_err(|e| PortError::Io(format!("serializing model: {e}")))?,
        };
        self.store.save(&artifact)?;

        Ok(TrainOutput {
            artifact,
            leaderboard,
            assignments,
        })
    }

    fn evaluate_plot(&self, artifact: &ModelArtifact, plot: PlotKind) -> PortResult<ImageHandle> {
        // Re-check against the artifact's own task, not the caller's.
        let plot = artifact.task_type.plot_kind(plot.name())?;
        let payload = Self::decode(artifact)?;
        fs::create_dir_all(&self.plots_dir)
            .map_err(|e| {
                PortError::Evaluation(format!("creating {}: {e}", self.plots_dir.display()))
            })?;
        let path = self.plots_dir.join(format!("{}.png", plot.name()));

        match (&payload, plot.name()) {
            (Payload::Classification { confusion, .. }, "confusion_matrix") => {
                plots::confusion_matrix(confusion, &path)?
            }
            (Payload::Classification { confusion, .. }, "error") => {
                plots::class_prediction_error(confusion, &path)?
            }
            (Payload::Regression { holdout, .. }, "residuals") => plots::residuals(holdout, &path)?,
            (Payload::Regression { holdout, .. }, "error") => {
                plots::prediction_error(holdout, &path)?
            }
            (Payload::Clustering { elbow, model, .. }, "elbow") => {
                plots::elbow(elbow, model.k(), &path)?
            }
            (Payload::Clustering { sizes, .. }, "distribution") => {
                plots::distribution(sizes, &path)?
            }
            (_, other) => {
                return Err(PortError::Evaluation(format!(
                    "plot '{other}' is not rendered by the {ENGINE} engine"
                )));
            }
        }

        Ok(ImageHandle {
            plot: plot.name().to_string(),
            path,
        })
    }

    fn load_artifact(&self, name: &str) -> PortResult<ModelArtifact> {
        self.store.load(name)
    }

    fn predict(
        &self,
        artifact: &ModelArtifact,
        dataset: &TabularDataset,
    ) -> PortResult<TabularDataset> {
        artifact.task_type.ensure_predictable()?;
        let payload = Self::decode(artifact)?;

        let (labels, scores): (Vec<Value>, Option<Vec<Value>>) = match &payload {
            Payload::Classification { features, model, .. } => {
                let x = features.transform(dataset)?;
                let (labels, scores): (Vec<Value>, Vec<Value>) = x
                    .iter()
                    .map(|r| {
                        let (label, score) = model.predict(r);
                        (Value::guess(&label), Value::Float(round4(score)))
                    })
                    .unzip();
                (labels, Some(scores))
            }
            Payload::Regression { features, model, .. } => {
                let x = features.transform(dataset)?;
                (x.iter().map(|r| Value::Float(model.predict(r))).collect(), None)
            }
            Payload::Clustering { .. } => {
                return Err(PortError::UnsupportedOperation(
                    "clustering artifacts cannot score new data".into(),
                ));
            }
        };

        let mut out = dataset
            .with_column(Column::new(PREDICTION_LABEL, labels))
            .map_err(|e| PortError::InvalidConfiguration(e.to_string()))?;
        if let Some(scores) = scores {
            out = out
                .with_column(Column::new(PREDICTION_SCORE, scores))
                .map_err(|e| PortError::InvalidConfiguration(e.to_string()))?;
        }
        Ok(out)
    }
}
