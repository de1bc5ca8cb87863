//! Task types and the per-task rule table.
//!
//! Everything that differs between classification, regression and clustering
//! (target requirement, allowed plots, prediction support, artifact slot) is
//! looked up here instead of being re-decided at each call site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PortError, PortResult};

/// Category of modelling problem, fixed when training is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
    Clustering,
}

/// Static rules for one task type.
#[derive(Debug)]
pub struct TaskRules {
    pub task: TaskType,
    pub name: &'static str,
    pub requires_target: bool,
    /// Whether a trained artifact can score new data.
    pub supports_predict: bool,
    pub plots: &'static [&'static str],
}

static RULES: [TaskRules; 3] = [
    TaskRules {
        task: TaskType::Classification,
        name: "classification",
        requires_target: true,
        supports_predict: true,
        plots: &["auc", "confusion_matrix", "precision_recall", "error", "boundary"],
    },
    TaskRules {
        task: TaskType::Regression,
        name: "regression",
        requires_target: true,
        supports_predict: true,
        plots: &[
            "residuals", "error", "cooks", "learning", "vc", "manifold", "feature", "rfe", "tree",
        ],
    },
    TaskRules {
        task: TaskType::Clustering,
        name: "clustering",
        requires_target: false,
        supports_predict: false,
        plots: &["elbow", "silhouette", "distance", "distribution"],
    },
];

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        TaskType::Classification,
        TaskType::Regression,
        TaskType::Clustering,
    ];

    pub fn rules(self) -> &'static TaskRules {
        match self {
            TaskType::Classification => &RULES[0],
            TaskType::Regression => &RULES[1],
            TaskType::Clustering => &RULES[2],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.rules().name
    }

    pub fn requires_target(self) -> bool {
        self.rules().requires_target
    }

    pub fn allowed_plots(self) -> &'static [&'static str] {
        self.rules().plots
    }

    /// Validate `raw` against the task's closed plot set.
    pub fn plot_kind(self, raw: &str) -> PortResult<PlotKind> {
        self.allowed_plots()
            .iter()
            .find(|p| **p == raw)
            .map(|name| PlotKind { task: self, name })
            .ok_or_else(|| PortError::UnsupportedPlot {
                plot: raw.to_string(),
                task: self.as_str().to_string(),
                allowed: self.allowed_plots().join(", "),
            })
    }

    /// Fail unless artifacts of this task can score new data.
    pub fn ensure_predictable(self) -> PortResult<()> {
        if self.rules().supports_predict {
            Ok(())
        } else {
            Err(PortError::UnsupportedOperation(format!(
                "{self} assigns groups to the training data and cannot predict on new data"
            )))
        }
    }

    /// Fixed artifact slot for this task under `base`, e.g. `best_model_regression`.
    pub fn artifact_name(self, base: &str) -> String {
        format!("{base}_{}", self.as_str())
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                PortError::InvalidConfiguration(format!(
                    "unknown task type '{s}' (expected classification, regression or clustering)"
                ))
            })
    }
}

/// A plot kind already checked against its task's allowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotKind {
    task: TaskType,
    name: &'static str,
}

impl PlotKind {
    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Validated training configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingConfig {
    pub task: TaskType,
    /// `None` for clustering.
    pub target: Option<String>,
    /// Number of clusters; only read for clustering.
    pub clusters: usize,
    pub seed: u64,
}
