//! Capability interfaces the orchestrator depends on.
//!
//! Each external tool (dataset registry, profiling engine, interactive editor,
//! model-search engine) sits behind one of these traits. Adapters are injected
//! when a session is built; the orchestrator never names a concrete tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;
use crate::data::TabularDataset;
use crate::error::PortResult;
use crate::task::{PlotKind, TrainingConfig};

// ---------------------------------------------------------------------------
// Handles returned by ports
// ---------------------------------------------------------------------------

/// Where a profile report was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandle {
    pub path: PathBuf,
}

/// A launched interactive editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Address the user opens to reach the editor, e.g. a URL.
    pub locator: String,
    /// File the editor works on; re-read on resync.
    pub working_copy: PathBuf,
    pub pid: Option<u32>,
}

/// A rendered evaluation plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub plot: String,
    pub path: PathBuf,
}

/// Model comparison table shown to the user. Not interpreted by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    /// Metric names, one per score column.
    pub metrics: Vec<String>,
    /// Best model first.
    pub rows: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub model: String,
    pub scores: Vec<f64>,
}

impl Leaderboard {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn best(&self) -> Option<&LeaderboardRow> {
        self.rows.first()
    }
}

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub artifact: ModelArtifact,
    pub leaderboard: Leaderboard,
    /// Training data with cluster assignments appended (clustering only).
    pub assignments: Option<TabularDataset>,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Remote dataset registry.
pub trait DatasetSource: Send + Sync {
    /// Establish credentials. Fails with `Authentication`.
    fn authenticate(&self) -> PortResult<()>;

    /// Fetch `dataset` into `destination`, returning the files written.
    /// Fails with `NotFound` for unknown identifiers and `Io` on storage errors.
    fn download(&self, dataset: &str, destination: &Path) -> PortResult<Vec<PathBuf>>;
}

/// Descriptive report generator. Must not modify its input.
pub trait Profiler: Send + Sync {
    fn profile(&self, dataset: &TabularDataset) -> PortResult<ReportHandle>;
}

/// Interactive browser/editor. `edit` returns as soon as the session is
/// launched; it never waits for the user.
pub trait InteractiveEditor: Send + Sync {
    fn edit(&self, dataset: &TabularDataset) -> PortResult<SessionHandle>;
}

/// Task-typed model search, persistence, evaluation and scoring.
pub trait Trainer: Send + Sync {
    /// Set up, search and persist under `artifact_name`.
    fn train(
        &self,
        dataset: &TabularDataset,
        config: &TrainingConfig,
        artifact_name: &str,
    ) -> PortResult<TrainOutput>;

    fn evaluate_plot(&self, artifact: &ModelArtifact, plot: PlotKind) -> PortResult<ImageHandle>;

    /// Fails with `ArtifactNotFound` when nothing is persisted under `name`.
    fn load_artifact(&self, name: &str) -> PortResult<ModelArtifact>;

    /// New data with prediction columns appended.
    fn predict(
        &self,
        artifact: &ModelArtifact,
        dataset: &TabularDataset,
    ) -> PortResult<TabularDataset>;
}

/// The set of adapters a session is built from.
#[derive(Clone)]
pub struct Ports {
    pub source: Arc<dyn DatasetSource>,
    pub profiler: Arc<dyn Profiler>,
    pub editor: Arc<dyn InteractiveEditor>,
    pub trainer: Arc<dyn Trainer>,
}
