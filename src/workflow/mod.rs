//! The workflow orchestrator.
//!
//! One operation per stage. Each operation checks its preconditions, calls a
//! single port, classifies any failure into a [`StageError`] and updates the
//! session references. Nothing here computes statistics or fits models.

mod state;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::artifact::ModelArtifact;
use crate::config::Settings;
use crate::data::loader;
use crate::data::TabularDataset;
use crate::error::{InStage, PortError, PortResult, Stage, StageError, StageResult};
use crate::ports::{ImageHandle, Leaderboard, Ports, ReportHandle, SessionHandle};
use crate::task::{TaskType, TrainingConfig};

pub use state::{Session, SessionState, TrainedModel};

/// What a successful `train` hands back to the presentation layer.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact_name: String,
    pub task: TaskType,
    pub leaderboard: Leaderboard,
    /// Training data with cluster labels (clustering only).
    pub assignments: Option<TabularDataset>,
    pub plot: Option<ImageHandle>,
    /// Optional steps that failed without failing training.
    pub warnings: Vec<String>,
}

pub struct Orchestrator {
    ports: Ports,
    data_dir: PathBuf,
    artifact_base: String,
    seed: u64,
    default_clusters: usize,
    profile_timeout: Duration,
    session: Session,
}

impl Orchestrator {
    pub fn new(ports: Ports, settings: &Settings) -> Self {
        Self {
            ports,
            data_dir: settings.data_dir.clone(),
            artifact_base: settings.artifact_base.clone(),
            seed: settings.session_seed,
            default_clusters: settings.default_clusters,
            profile_timeout: Duration::from_secs(settings.profile_timeout_secs),
            session: Session::default(),
        }
    }

    /// Use a different artifact slot base, e.g. to keep two sessions apart.
    pub fn with_artifact_base(mut self, base: impl Into<String>) -> Self {
        self.artifact_base = base.into();
        self
    }

    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }

    // -- queries ------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn dataset(&self) -> Option<&TabularDataset> {
        self.session.dataset.as_ref()
    }

    pub fn scoring_dataset(&self) -> Option<&TabularDataset> {
        self.session.scoring.as_ref()
    }

    pub fn training_config(&self) -> Option<&TrainingConfig> {
        self.session.config.as_ref()
    }

    pub fn trained_model(&self) -> Option<&TrainedModel> {
        self.session.trained.as_ref()
    }

    pub fn editor_session(&self) -> Option<&SessionHandle> {
        self.session.editor.as_ref()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Fixed slot the artifact of `task` lives in.
    pub fn artifact_name(&self, task: TaskType) -> String {
        task.artifact_name(&self.artifact_base)
    }

    // -- acquisition --------------------------------------------------------

    /// Authenticate with the registry and download `dataset` into the data directory.
    pub fn download(&self, dataset: &str) -> StageResult<Vec<PathBuf>> {
        log::info!("authenticating with dataset registry");
        self.ports.source.authenticate().in_stage(Stage::Download)?;
        log::info!("downloading '{dataset}' into {}", self.data_dir.display());
        let files = self
            .ports
            .source
            .download(dataset, &self.data_dir)
            .in_stage(Stage::Download)
            .inspect_err(|e| log::error!("{e}"))?;
        log::info!("downloaded {} file(s)", files.len());
        Ok(files)
    }

    fn read_table(&self, name: &str, stage: Stage) -> StageResult<TabularDataset> {
        let path = self.data_dir.join(name);
        read_table_at(&path).in_stage(stage)
    }

    /// Load `name` (relative to the data directory, or absolute) as the
    /// working dataset.
    pub fn load_dataset(&mut self, name: &str) -> StageResult<&TabularDataset> {
        let dataset = self.read_table(name, Stage::Load)?;
        Ok(self.set_dataset(dataset))
    }

    /// Make an already loaded table the working dataset.
    pub fn set_dataset(&mut self, dataset: TabularDataset) -> &TabularDataset {
        log::info!(
            "working dataset '{}': {} rows, columns {:?}",
            dataset.name(),
            dataset.n_rows(),
            dataset.column_names()
        );
        self.session.replace_dataset(dataset)
    }

    fn require_dataset(&self, stage: Stage) -> StageResult<&TabularDataset> {
        self.session.dataset.as_ref().ok_or_else(|| {
            StageError::new(stage, PortError::InvalidConfiguration("no dataset loaded".into()))
        })
    }

    // -- profiling ----------------------------------------------------------

    /// Profile the working dataset. Blocks until the report is written or
    /// the configured timeout elapses.
    pub fn profile(&self) -> StageResult<ReportHandle> {
        let dataset = self.require_dataset(Stage::Profile)?.clone();
        let profiler = Arc::clone(&self.ports.profiler);
        let timeout = self.profile_timeout;
        log::info!("profiling '{}'", dataset.name());

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("profiler".into())
            .spawn(move || {
                // The receiver may have given up already.
                let _ = tx.send(profiler.profile(&dataset));
            })
            .map_err(|e| PortError::Io(format!("cannot start profiler worker: {e}")))
            .in_stage(Stage::Profile)?;

        let result = match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(PortError::Profiling(format!(
                "no report after {}s",
                timeout.as_secs()
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PortError::Profiling("profiler worker stopped without a result".into()))
            }
        };
        let report = result.in_stage(Stage::Profile).inspect_err(|e| log::error!("{e}"))?;
        log::info!("profile report written to {}", report.path.display());
        Ok(report)
    }

    // -- interactive editing ------------------------------------------------

    /// Launch the interactive editor on the working dataset and return at once.
    pub fn edit(&mut self) -> StageResult<&SessionHandle> {
        let dataset = self.require_dataset(Stage::Edit)?;
        let handle = self.ports.editor.edit(dataset).in_stage(Stage::Edit)?;
        log::info!("editor session available at {}", handle.locator);
        Ok(self.session.editor.insert(handle))
    }

    /// Reload the editor's working copy as the new working dataset.
    pub fn resync(&mut self) -> StageResult<&TabularDataset> {
        let handle = self.session.editor.as_ref().ok_or_else(|| {
            StageError::new(
                Stage::Resync,
                PortError::InvalidConfiguration("no editor session started".into()),
            )
        })?;
        let name = self
            .session
            .dataset
            .as_ref()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| file_name(&handle.working_copy));
        let edited = read_table_at(&handle.working_copy)
            .in_stage(Stage::Resync)?
            .renamed(name);
        Ok(self.set_dataset(edited))
    }

    // -- configuration and training ----------------------------------------

    /// Choose the task type and target. The target must be a column of the
    /// working dataset when the task needs one; it is dropped for clustering.
    pub fn configure(
        &mut self,
        task: TaskType,
        target: Option<&str>,
        clusters: Option<usize>,
    ) -> StageResult<&TrainingConfig> {
        let dataset = self.require_dataset(Stage::Configure)?;
        let config = TrainingConfig {
            task,
            target: if task.requires_target() { target.map(str::to_string) } else { None },
            clusters: clusters.unwrap_or(self.default_clusters),
            seed: self.seed,
        };
        validate_config(dataset, &config).in_stage(Stage::Configure)?;
        if !task.requires_target() {
            if let Some(ignored) = target {
                log::warn!("{task} ignores target column '{ignored}'");
            }
        }
        log::info!("configured {task} (target: {:?})", config.target);
        Ok(self.session.set_config(config))
    }

    pub fn train(&mut self) -> StageResult<TrainingOutcome> {
        self.train_with_plot(None)
    }

    /// Train, persist, and optionally render one evaluation plot. A plot that
    /// cannot be produced becomes a warning on the outcome.
    pub fn train_with_plot(&mut self, plot: Option<&str>) -> StageResult<TrainingOutcome> {
        let dataset = self.require_dataset(Stage::Train)?;
        let config = self.session.config.clone().ok_or_else(|| {
            StageError::new(
                Stage::Train,
                PortError::InvalidConfiguration("training is not configured".into()),
            )
        })?;
        // The dataset may have changed shape since configure.
        validate_config(dataset, &config).in_stage(Stage::Train)?;

        let mut warnings = Vec::new();
        let plot_kind = match plot.map(|p| config.task.plot_kind(p)) {
            Some(Ok(kind)) => Some(kind),
            Some(Err(e)) => {
                log::warn!("{e}");
                warnings.push(e.to_string());
                None
            }
            None => None,
        };

        let artifact_name = self.artifact_name(config.task);
        log::info!(
            "training {} on '{}' into slot '{artifact_name}'",
            config.task,
            dataset.name()
        );
        let output = self
            .ports
            .trainer
            .train(dataset, &config, &artifact_name)
            .in_stage(Stage::Train)
            .inspect_err(|e| log::error!("{e}"))?;
        check_tags(&output.artifact, config.task).in_stage(Stage::Train)?;

        let plot = plot_kind.and_then(|kind| {
            match self.ports.trainer.evaluate_plot(&output.artifact, kind) {
                Ok(image) => Some(image),
                Err(e) => {
                    let e = StageError::new(Stage::Plot, e);
                    log::warn!("{e}");
                    warnings.push(e.to_string());
                    None
                }
            }
        });

        self.session.set_trained(TrainedModel {
            artifact_name: artifact_name.clone(),
            task: config.task,
            target: output.artifact.target_column.clone(),
        });
        log::info!(
            "trained {} model; best: {}",
            config.task,
            output.leaderboard.best().map(|r| r.model.as_str()).unwrap_or("-")
        );

        Ok(TrainingOutcome {
            artifact_name,
            task: config.task,
            leaderboard: output.leaderboard,
            assignments: output.assignments,
            plot,
            warnings,
        })
    }

    fn require_trained(&self, stage: Stage) -> StageResult<&TrainedModel> {
        self.session.trained.as_ref().ok_or_else(|| {
            StageError::new(
                stage,
                PortError::InvalidConfiguration("no trained model in this session".into()),
            )
        })
    }

    /// Re-read the persisted artifact behind the trained model. Storage is
    /// external, so presence is checked on every call.
    fn reload_trained(&self, stage: Stage) -> StageResult<ModelArtifact> {
        let trained = self.require_trained(stage)?;
        let artifact = self
            .ports
            .trainer
            .load_artifact(&trained.artifact_name)
            .in_stage(stage)?;
        check_tags(&artifact, trained.task).in_stage(stage)?;
        Ok(artifact)
    }

    // -- evaluation ---------------------------------------------------------

    /// Render `plot` for the trained model. Never changes the session state.
    pub fn evaluate_plot(&self, plot: &str) -> StageResult<ImageHandle> {
        let trained = self.require_trained(Stage::Plot)?;
        let kind = trained.task.plot_kind(plot).in_stage(Stage::Plot)?;
        let artifact = self.reload_trained(Stage::Plot)?;
        self.ports
            .trainer
            .evaluate_plot(&artifact, kind)
            .in_stage(Stage::Plot)
            .inspect_err(|e| log::warn!("{e}"))
    }

    /// Load the persisted artifact of `task` from its fixed slot.
    pub fn load_artifact(&self, task: TaskType) -> StageResult<ModelArtifact> {
        let artifact = self
            .ports
            .trainer
            .load_artifact(&self.artifact_name(task))
            .in_stage(Stage::Artifact)?;
        check_tags(&artifact, task).in_stage(Stage::Artifact)?;
        Ok(artifact)
    }

    /// Adopt the artifact persisted for `task` by an earlier session.
    pub fn attach_trained(&mut self, task: TaskType) -> StageResult<&TrainedModel> {
        let artifact = self.load_artifact(task)?;
        log::info!("using persisted {task} artifact '{}'", artifact.name);
        Ok(self.session.set_trained(TrainedModel {
            artifact_name: artifact.name,
            task,
            target: artifact.target_column,
        }))
    }

    // -- scoring ------------------------------------------------------------

    /// Load new data to score with the trained model. The artifact must
    /// still be present in storage.
    pub fn load_scoring_data(&mut self, name: &str) -> StageResult<&TabularDataset> {
        self.reload_trained(Stage::Score)?;
        let dataset = self.read_table(name, Stage::Score)?;
        log::info!("scoring dataset '{}': {} rows", dataset.name(), dataset.n_rows());
        Ok(self.session.scoring.insert(dataset))
    }

    /// Apply the trained model to the scoring data.
    pub fn predict(&self) -> StageResult<TabularDataset> {
        let trained = self.require_trained(Stage::Predict)?;
        trained.task.ensure_predictable().in_stage(Stage::Predict)?;
        let scoring = self.session.scoring.as_ref().ok_or_else(|| {
            StageError::new(
                Stage::Predict,
                PortError::InvalidConfiguration("no data loaded for scoring".into()),
            )
        })?;
        let artifact = self.reload_trained(Stage::Predict)?;
        let result = self
            .ports
            .trainer
            .predict(&artifact, scoring)
            .in_stage(Stage::Predict)
            .inspect_err(|e| log::error!("{e}"))?;
        log::info!("scored {} rows with '{}'", result.n_rows(), artifact.name);
        Ok(result)
    }

    /// Score the file `name` with the persisted model of `task`, adopting
    /// that model first if this session has not trained one.
    pub fn score_file(&mut self, task: TaskType, name: &str) -> StageResult<TabularDataset> {
        task.ensure_predictable().in_stage(Stage::Predict)?;
        let current = self.session.trained.as_ref().map(|t| t.task);
        if current != Some(task) {
            self.attach_trained(task)?;
        }
        self.load_scoring_data(name)?;
        self.predict()
    }
}

fn read_table_at(path: &Path) -> PortResult<TabularDataset> {
    if !path.is_file() {
        return Err(PortError::NotFound(format!("dataset file {}", path.display())));
    }
    loader::load_file(path).map_err(|e| PortError::Io(format!("{e:#}")))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset")
        .to_string()
}

fn validate_config(dataset: &TabularDataset, config: &TrainingConfig) -> PortResult<()> {
    if config.task.requires_target() {
        let target = config.target.as_deref().ok_or_else(|| {
            PortError::InvalidConfiguration(format!("{} requires a target column", config.task))
        })?;
        if !dataset.has_column(target) {
            return Err(PortError::InvalidConfiguration(format!(
                "target '{target}' is not a column of '{}' (columns: {})",
                dataset.name(),
                dataset.column_names().join(", ")
            )));
        }
    } else if config.clusters < 2 {
        return Err(PortError::InvalidConfiguration(format!(
            "number of clusters must be at least 2, got {}",
            config.clusters
        )));
    }
    Ok(())
}

/// An artifact may only be used under the task type it was trained for.
fn check_tags(artifact: &ModelArtifact, expected: TaskType) -> PortResult<()> {
    if artifact.task_type == expected {
        Ok(())
    } else {
        Err(PortError::InvalidConfiguration(format!(
            "artifact '{}' holds a {} model, not {expected}",
            artifact.name, artifact.task_type
        )))
    }
}
