use std::path::Path;
use std::sync::Arc;

use crate::data::summary::{self, ColumnSummary};
use crate::data::TabularDataset;
use crate::error::{InStage, Stage, StageError};
use crate::task::TaskType;
use crate::workflow::{Orchestrator, TrainingOutcome};

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// A rendered plot held in memory for display.
pub struct PlotImage {
    pub plot: String,
    /// Unique per render so egui does not show a cached older image.
    pub uri: String,
    pub bytes: Arc<[u8]>,
}

/// Which EDA panels are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdaToggles {
    pub preview: bool,
    pub describe: bool,
    pub dtypes: bool,
    pub missing: bool,
}

impl Default for EdaToggles {
    fn default() -> Self {
        Self {
            preview: true,
            describe: false,
            dtypes: false,
            missing: false,
        }
    }
}

/// The full UI state, independent of rendering.
pub struct DashboardState {
    pub session: Orchestrator,

    pub eda: EdaToggles,
    /// Cached summaries of the working dataset.
    pub summaries: Vec<ColumnSummary>,

    /// Training selections.
    pub task: TaskType,
    pub target: Option<String>,
    pub clusters: usize,
    pub plot: Option<&'static str>,

    pub outcome: Option<TrainingOutcome>,
    pub plot_image: Option<PlotImage>,
    pub predictions: Option<TabularDataset>,

    /// Status / error message shown in the UI.
    pub status: Option<String>,
    pub status_is_error: bool,

    generation: u64,
}

impl DashboardState {
    pub fn new(session: Orchestrator, default_clusters: usize) -> Self {
        Self {
            session,
            eda: EdaToggles::default(),
            summaries: Vec::new(),
            task: TaskType::Classification,
            target: None,
            clusters: default_clusters.max(2),
            plot: None,
            outcome: None,
            plot_image: None,
            predictions: None,
            status: None,
            status_is_error: false,
            generation: 0,
        }
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
        self.status_is_error = false;
    }

    fn fail(&mut self, err: StageError) {
        log::error!("{err}");
        self.status = Some(err.to_string());
        self.status_is_error = true;
    }

    /// Open a training dataset. Everything derived from the previous one is
    /// discarded.
    pub fn open_training(&mut self, path: &Path) {
        let name = path.to_string_lossy();
        match self.session.load_dataset(&name) {
            Ok(dataset) => {
                let summaries = summary::describe(dataset);
                // Last column is the usual place for a label.
                let target = dataset.column_names().last().map(|s| s.to_string());
                let msg = format!("loaded {} ({} rows)", dataset.name(), dataset.n_rows());
                self.summaries = summaries;
                self.target = target;
                self.outcome = None;
                self.plot_image = None;
                self.predictions = None;
                self.info(msg);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Open new data to score with the model of the selected task. A model
    /// persisted by an earlier run is adopted when this session has not
    /// trained one for that task.
    pub fn open_scoring(&mut self, path: &Path) {
        if let Err(e) = self.task.ensure_predictable().in_stage(Stage::Score) {
            return self.fail(e);
        }
        let current = self.session.trained_model().map(|t| t.task);
        if current != Some(self.task) {
            if let Err(e) = self.session.attach_trained(self.task) {
                return self.fail(e);
            }
        }
        let name = path.to_string_lossy();
        match self.session.load_scoring_data(&name) {
            Ok(dataset) => {
                let msg = format!(
                    "{} ready for scoring ({} rows)",
                    dataset.name(),
                    dataset.n_rows()
                );
                self.predictions = None;
                self.info(msg);
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn set_task(&mut self, task: TaskType) {
        if self.task != task {
            self.task = task;
            self.plot = None;
        }
    }

    pub fn train(&mut self) {
        let configured = self
            .session
            .configure(self.task, self.target.as_deref(), Some(self.clusters))
            .map(|_| ());
        if let Err(e) = configured {
            return self.fail(e);
        }
        match self.session.train_with_plot(self.plot) {
            Ok(outcome) => {
                let mut msg = format!("trained {} model '{}'", outcome.task, outcome.artifact_name);
                if let Some(w) = outcome.warnings.first() {
                    msg.push_str(&format!(" (warning: {w})"));
                }
                let image = match &outcome.plot {
                    Some(image) => self.read_image(&image.plot, &image.path),
                    None => None,
                };
                self.plot_image = image;
                self.predictions = None;
                self.outcome = Some(outcome);
                self.info(msg);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Render `plot` for the trained model and show it.
    pub fn show_plot(&mut self, plot: &'static str) {
        self.plot = Some(plot);
        match self.session.evaluate_plot(plot) {
            Ok(image) => {
                self.plot_image = self.read_image(&image.plot, &image.path);
            }
            Err(e) => {
                self.plot_image = None;
                self.fail(e);
            }
        }
    }

    pub fn predict(&mut self) {
        match self.session.predict() {
            Ok(scored) => {
                let msg = format!("scored {} rows", scored.n_rows());
                self.predictions = Some(scored);
                self.info(msg);
            }
            Err(e) => self.fail(e),
        }
    }

    fn read_image(&mut self, plot: &str, path: &Path) -> Option<PlotImage> {
        match std::fs::read(path) {
            Ok(bytes) => {
                self.generation += 1;
                Some(PlotImage {
                    plot: plot.to_string(),
                    uri: format!("bytes://plots/{}/{plot}.png", self.generation),
                    bytes: bytes.into(),
                })
            }
            Err(e) => {
                log::warn!("cannot read plot {}: {e}", path.display());
                self.status = Some(format!("cannot read plot {}: {e}", path.display()));
                self.status_is_error = true;
                None
            }
        }
    }
}
