use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tabflow::adapters::baseline::{
    BaselineTrainer, CLUSTER_COLUMN, PREDICTION_LABEL, PREDICTION_SCORE,
};
use tabflow::adapters::profiler::SummaryProfiler;
use tabflow::adapters::registry::LocalRegistry;
use tabflow::artifact::ArtifactStore;
use tabflow::config::Settings;
use tabflow::data::{loader, TabularDataset};
use tabflow::error::{PortError, PortResult, Stage};
use tabflow::ports::{
    InteractiveEditor, Ports, Profiler, ReportHandle, SessionHandle, Trainer,
};
use tabflow::task::{TaskType, TrainingConfig};
use tabflow::workflow::{Orchestrator, SessionState};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tabflow-it-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writes the working copy and returns without launching anything.
struct FakeEditor {
    workspace: PathBuf,
}

impl InteractiveEditor for FakeEditor {
    fn edit(&self, dataset: &TabularDataset) -> PortResult<SessionHandle> {
        fs::create_dir_all(&self.workspace)?;
        let working_copy = self.workspace.join(format!("{}.edit.csv", stem(dataset.name())));
        loader::write_csv(dataset, &working_copy).map_err(|e| PortError::Io(format!("{e:#}")))?;
        Ok(SessionHandle {
            locator: "http://localhost:40000".into(),
            working_copy,
            pid: None,
        })
    }
}

struct SlowProfiler;

impl Profiler for SlowProfiler {
    fn profile(&self, _dataset: &TabularDataset) -> PortResult<ReportHandle> {
        thread::sleep(Duration::from_secs(2));
        Ok(ReportHandle { path: PathBuf::from("never.html") })
    }
}

fn stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

struct Env {
    root: PathBuf,
    settings: Settings,
}

impl Env {
    fn new(tag: &str) -> Self {
        let root = scratch(tag);
        let settings = Settings::rooted_at(&root);
        fs::create_dir_all(&settings.data_dir).unwrap();
        fs::create_dir_all(root.join("registry")).unwrap();
        Self { root, settings }
    }

    fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.settings.models_dir)
    }

    fn ports(&self) -> Ports {
        Ports {
            source: Arc::new(LocalRegistry::new(self.root.join("registry"))),
            profiler: Arc::new(SummaryProfiler::new(&self.settings.reports_dir)),
            editor: Arc::new(FakeEditor { workspace: self.settings.data_dir.clone() }),
            trainer: Arc::new(BaselineTrainer::new(self.store(), &self.settings.plots_dir)),
        }
    }

    fn session(&self) -> Orchestrator {
        Orchestrator::new(self.ports(), &self.settings)
    }

    fn write(&self, name: &str, text: &str) {
        fs::write(self.settings.data_dir.join(name), text).unwrap();
    }
}

/// `[age, income, churn]` with two well separated groups.
fn churn_csv() -> String {
    let mut text = String::from("age,income,churn\n");
    for i in 0..20 {
        text.push_str(&format!("{},{},yes\n", 20 + i % 10, 20_000 + i * 100));
        text.push_str(&format!("{},{},no\n", 60 + i % 10, 90_000 + i * 100));
    }
    text
}

/// New customers without the label.
fn churn_new_csv() -> String {
    "age,income\n22,20500\n65,91000\n".to_string()
}

/// `price = 1000 + 50 * sqft`.
fn housing_csv() -> String {
    let mut text = String::from("sqft,rooms,price\n");
    for i in 0..30 {
        let sqft = 500 + i * 40;
        text.push_str(&format!("{sqft},{},{}\n", 1 + i % 4, 1000 + 50 * sqft));
    }
    text
}

fn trained_churn(env: &Env) -> Orchestrator {
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();
    session.configure(TaskType::Classification, Some("churn"), None).unwrap();
    session.train().unwrap();
    session
}

// ---------------------------------------------------------------------------
// Acquisition, profiling, editing
// ---------------------------------------------------------------------------

#[test]
fn download_then_load_from_local_registry() {
    let env = Env::new("download");
    let published = env.root.join("registry").join("acme").join("churn");
    fs::create_dir_all(&published).unwrap();
    fs::write(published.join("churn.csv"), churn_csv()).unwrap();

    let mut session = env.session();
    let files = session.download("acme/churn").unwrap();
    assert_eq!(files, vec![env.settings.data_dir.join("churn.csv")]);

    let dataset = session.load_dataset("churn.csv").unwrap();
    assert_eq!(dataset.column_names(), vec!["age", "income", "churn"]);
    assert_eq!(session.state(), SessionState::DataLoaded);
}

#[test]
fn download_failures_are_classified() {
    let env = Env::new("download-fail");
    let session = env.session();
    let err = session.download("acme/missing").unwrap_err();
    assert_eq!(err.stage, Stage::Download);
    assert!(matches!(err.kind(), PortError::NotFound(_)));

    fs::remove_dir_all(env.root.join("registry")).unwrap();
    let err = session.download("acme/missing").unwrap_err();
    assert!(matches!(err.kind(), PortError::Authentication(_)));
    assert_eq!(err.to_string().split(':').next(), Some("download failed"));
}

#[test]
fn loading_a_missing_file_is_not_found_and_stays_idle() {
    let env = Env::new("missing");
    let mut session = env.session();
    let err = session.load_dataset("nope.csv").unwrap_err();
    assert_eq!(err.stage, Stage::Load);
    assert!(matches!(err.kind(), PortError::NotFound(_)));
    assert_eq!(session.state(), SessionState::Idle);

    env.write("table.xlsx", "not really a spreadsheet");
    let err = session.load_dataset("table.xlsx").unwrap_err();
    assert!(matches!(err.kind(), PortError::Io(msg) if msg.contains("Unsupported")));
}

#[test]
fn profile_writes_report_and_rejects_empty_data() {
    let env = Env::new("profile");
    env.write("churn.csv", &churn_csv());
    env.write("empty.csv", "age,income\n");
    let mut session = env.session();

    assert!(matches!(
        session.profile().unwrap_err().kind(),
        PortError::InvalidConfiguration(_)
    ));

    session.load_dataset("churn.csv").unwrap();
    let report = session.profile().unwrap();
    assert_eq!(report.path, env.settings.reports_dir.join("churn_profile.html"));
    assert!(report.path.is_file());
    assert_eq!(session.state(), SessionState::DataLoaded);

    session.load_dataset("empty.csv").unwrap();
    let err = session.profile().unwrap_err();
    assert_eq!(err.stage, Stage::Profile);
    assert!(matches!(err.kind(), PortError::Profiling(_)));
}

#[test]
fn slow_profiling_times_out() {
    let env = Env::new("profile-timeout");
    env.write("churn.csv", &churn_csv());
    let ports = Ports { profiler: Arc::new(SlowProfiler), ..env.ports() };
    let mut session = Orchestrator::new(ports, &env.settings)
        .with_profile_timeout(Duration::from_millis(100));
    session.load_dataset("churn.csv").unwrap();

    let started = Instant::now();
    let err = session.profile().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(err.kind(), PortError::Profiling(msg) if msg.contains("no report")));
}

#[test]
fn edit_returns_handle_and_resync_replaces_dataset() {
    let env = Env::new("edit");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();

    assert!(matches!(
        session.resync().unwrap_err().kind(),
        PortError::InvalidConfiguration(_)
    ));

    session.load_dataset("churn.csv").unwrap();
    session.configure(TaskType::Classification, Some("churn"), None).unwrap();
    let handle = session.edit().unwrap().clone();
    assert_eq!(handle.working_copy, env.settings.data_dir.join("churn.edit.csv"));
    assert_eq!(session.editor_session(), Some(&handle));

    // The user drops the income column in the editor.
    fs::write(&handle.working_copy, "age,churn\n20,yes\n61,no\n").unwrap();
    let dataset = session.resync().unwrap();
    assert_eq!(dataset.name(), "churn.csv");
    assert_eq!(dataset.column_names(), vec!["age", "churn"]);
    assert_eq!(dataset.n_rows(), 2);
    assert_eq!(session.state(), SessionState::DataLoaded);
}

// ---------------------------------------------------------------------------
// Configuration and training
// ---------------------------------------------------------------------------

#[test]
fn target_must_be_a_column_of_the_dataset() {
    let env = Env::new("target");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();

    for bad in ["price", "", "Churn"] {
        for task in [TaskType::Classification, TaskType::Regression] {
            let err = session.configure(task, Some(bad), None).unwrap_err();
            assert_eq!(err.stage, Stage::Configure, "{task} {bad:?}");
            assert!(matches!(err.kind(), PortError::InvalidConfiguration(_)), "{task} {bad:?}");
        }
    }
    assert!(matches!(
        session.configure(TaskType::Regression, None, None).unwrap_err().kind(),
        PortError::InvalidConfiguration(_)
    ));
    assert_eq!(session.state(), SessionState::DataLoaded);

    session.configure(TaskType::Classification, Some("churn"), None).unwrap();
    assert_eq!(session.state(), SessionState::Configured);
}

#[test]
fn churn_classification_scenario() {
    let env = Env::new("churn");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();
    session.configure(TaskType::Classification, Some("churn"), None).unwrap();

    let outcome = session.train().unwrap();
    assert!(!outcome.leaderboard.is_empty());
    assert_eq!(outcome.artifact_name, "best_model_classification");
    assert!(outcome.warnings.is_empty());
    assert_eq!(session.state(), SessionState::Trained);

    let artifact = session.load_artifact(TaskType::Classification).unwrap();
    assert_eq!(artifact.task_type, TaskType::Classification);
    assert_eq!(artifact.target_column.as_deref(), Some("churn"));
    assert!(env.store().path_for("best_model_classification").is_file());
}

#[test]
fn train_then_load_artifact_round_trips_metadata() {
    let env = Env::new("roundtrip");
    env.write("housing.csv", &housing_csv());
    let mut session = env.session();
    session.load_dataset("housing.csv").unwrap();
    session.configure(TaskType::Regression, Some("price"), None).unwrap();
    let outcome = session.train().unwrap();
    assert_eq!(outcome.leaderboard.best().map(|r| r.model.as_str()), Some("Linear Regression"));

    let artifact = session.load_artifact(TaskType::Regression).unwrap();
    assert_eq!(artifact.name, "best_model_regression");
    assert_eq!(artifact.task_type, TaskType::Regression);
    assert_eq!(artifact.target_column.as_deref(), Some("price"));
}

#[test]
fn missing_regression_target_fails_before_search() {
    let env = Env::new("no-price");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();

    let err = session.configure(TaskType::Regression, Some("price"), None).unwrap_err();
    assert!(matches!(err.kind(), PortError::InvalidConfiguration(_)));
    let err = session.train().unwrap_err();
    assert!(matches!(err.kind(), PortError::InvalidConfiguration(_)));

    // Calling the trainer directly is rejected in setup as well.
    let trainer = BaselineTrainer::new(env.store(), &env.settings.plots_dir);
    let config = TrainingConfig {
        task: TaskType::Regression,
        target: Some("price".into()),
        clusters: 3,
        seed: 123,
    };
    let dataset = session.dataset().unwrap().clone();
    let err = trainer.train(&dataset, &config, "best_model_regression").unwrap_err();
    assert!(matches!(err, PortError::InvalidConfiguration(_)));
    assert!(!env.store().exists("best_model_regression"));
    let models = &env.settings.models_dir;
    assert!(!models.exists() || fs::read_dir(models).unwrap().next().is_none());
}

#[test]
fn clustering_trains_without_target_and_refuses_prediction() {
    let env = Env::new("clustering");
    env.write("churn.csv", &churn_csv());
    env.write("churn_new.csv", &churn_new_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();
    let config = session.configure(TaskType::Clustering, Some("churn"), Some(2)).unwrap();
    assert_eq!(config.target, None);

    let outcome = session.train().unwrap();
    let assigned = outcome.assignments.unwrap();
    assert!(assigned.has_column(CLUSTER_COLUMN));
    assert_eq!(assigned.n_rows(), 40);
    assert!(session.load_artifact(TaskType::Clustering).unwrap().target_column.is_none());

    let err = session.predict().unwrap_err();
    assert!(matches!(err.kind(), PortError::UnsupportedOperation(_)));
    for file in ["churn_new.csv", "churn.csv", "does_not_exist.csv"] {
        let err = session.score_file(TaskType::Clustering, file).unwrap_err();
        assert!(matches!(err.kind(), PortError::UnsupportedOperation(_)), "{file}");
    }
    assert_eq!(session.state(), SessionState::Trained);
}

#[test]
fn clusters_below_two_are_rejected() {
    let env = Env::new("one-cluster");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();
    let err = session.configure(TaskType::Clustering, None, Some(1)).unwrap_err();
    assert!(matches!(err.kind(), PortError::InvalidConfiguration(_)));
}

#[test]
fn plot_failures_after_training_are_warnings() {
    let env = Env::new("train-plot");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();
    session.configure(TaskType::Classification, Some("churn"), None).unwrap();

    let outcome = session.train_with_plot(Some("confusion_matrix")).unwrap();
    let image = outcome.plot.unwrap();
    assert_eq!(image.path, env.settings.plots_dir.join("confusion_matrix.png"));
    assert!(image.path.is_file());

    session.configure(TaskType::Classification, Some("churn"), None).unwrap();
    let outcome = session.train_with_plot(Some("auc")).unwrap();
    assert!(outcome.plot.is_none());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(session.state(), SessionState::Trained);

    session.configure(TaskType::Classification, Some("churn"), None).unwrap();
    let outcome = session.train_with_plot(Some("residuals")).unwrap();
    assert!(outcome.warnings[0].contains("residuals"));
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[test]
fn plot_outside_task_set_is_unsupported_and_keeps_state() {
    let env = Env::new("unsupported-plot");
    let session = trained_churn(&env);

    let err = session.evaluate_plot("residuals").unwrap_err();
    assert_eq!(err.stage, Stage::Plot);
    assert!(matches!(err.kind(), PortError::UnsupportedPlot { .. }));
    assert_eq!(session.state(), SessionState::Trained);

    assert!(matches!(
        session.evaluate_plot("boundary").unwrap_err().kind(),
        PortError::Evaluation(_)
    ));
    assert_eq!(session.state(), SessionState::Trained);

    let image = session.evaluate_plot("error").unwrap();
    assert!(image.path.is_file());
}

#[test]
fn plotting_requires_a_trained_model() {
    let env = Env::new("plot-untrained");
    env.write("churn.csv", &churn_csv());
    let mut session = env.session();
    session.load_dataset("churn.csv").unwrap();
    assert!(matches!(
        session.evaluate_plot("auc").unwrap_err().kind(),
        PortError::InvalidConfiguration(_)
    ));
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[test]
fn predict_appends_label_and_score() {
    let env = Env::new("predict");
    env.write("churn_new.csv", &churn_new_csv());
    let mut session = trained_churn(&env);

    session.load_scoring_data("churn_new.csv").unwrap();
    assert_eq!(session.state(), SessionState::ReadyForPrediction);
    let scored = session.predict().unwrap();
    assert_eq!(scored.column_names(), vec!["age", "income", PREDICTION_LABEL, PREDICTION_SCORE]);
    let labels: Vec<String> = scored
        .column(PREDICTION_LABEL)
        .unwrap()
        .values
        .iter()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(labels, vec!["yes", "no"]);
}

#[test]
fn predict_rejects_artifact_of_another_task() {
    let env = Env::new("mismatch");
    env.write("churn_new.csv", &churn_new_csv());
    let mut session = trained_churn(&env);
    session.load_scoring_data("churn_new.csv").unwrap();

    // Something else overwrote the slot with a model of a different task.
    let store = env.store();
    let mut artifact = store.load("best_model_classification").unwrap();
    artifact.task_type = TaskType::Regression;
    store.save(&artifact).unwrap();

    let err = session.predict().unwrap_err();
    assert_eq!(err.stage, Stage::Predict);
    assert!(matches!(err.kind(), PortError::InvalidConfiguration(_)));
}

#[test]
fn scoring_rechecks_that_the_artifact_still_exists() {
    let env = Env::new("cleared");
    env.write("churn_new.csv", &churn_new_csv());
    let mut session = trained_churn(&env);

    fs::remove_file(env.store().path_for("best_model_classification")).unwrap();
    let err = session.load_scoring_data("churn_new.csv").unwrap_err();
    assert_eq!(err.stage, Stage::Score);
    assert!(matches!(err.kind(), PortError::ArtifactNotFound(_)));
    assert_eq!(session.state(), SessionState::Trained);
}

#[test]
fn loading_new_data_invalidates_the_trained_model() {
    let env = Env::new("reload");
    env.write("housing.csv", &housing_csv());
    env.write("churn_new.csv", &churn_new_csv());
    let mut session = trained_churn(&env);
    session.load_scoring_data("churn_new.csv").unwrap();

    session.load_dataset("housing.csv").unwrap();
    assert_eq!(session.state(), SessionState::DataLoaded);
    assert!(session.trained_model().is_none());
    assert!(matches!(
        session.predict().unwrap_err().kind(),
        PortError::InvalidConfiguration(_)
    ));
    assert!(matches!(
        session.train().unwrap_err().kind(),
        PortError::InvalidConfiguration(_)
    ));
}

#[test]
fn score_file_uses_the_persisted_artifact_from_an_earlier_session() {
    let env = Env::new("later-session");
    env.write("churn_new.csv", &churn_new_csv());
    drop(trained_churn(&env));

    let mut later = env.session();
    let scored = later.score_file(TaskType::Classification, "churn_new.csv").unwrap();
    assert!(scored.has_column(PREDICTION_LABEL));
    assert_eq!(later.state(), SessionState::ReadyForPrediction);

    let err = later.score_file(TaskType::Regression, "churn_new.csv").unwrap_err();
    assert!(matches!(err.kind(), PortError::ArtifactNotFound(_)));
}

#[test]
fn retraining_overwrites_the_slot_and_bases_keep_sessions_apart() {
    let env = Env::new("slots");
    env.write("churn.csv", &churn_csv());

    let _first = trained_churn(&env);
    let _second = trained_churn(&env);
    let slots: Vec<_> = fs::read_dir(&env.settings.models_dir).unwrap().collect();
    assert_eq!(slots.len(), 1);

    let mut other = env.session().with_artifact_base("experiment");
    other.load_dataset("churn.csv").unwrap();
    other.configure(TaskType::Classification, Some("churn"), None).unwrap();
    assert_eq!(other.train().unwrap().artifact_name, "experiment_classification");
    assert!(env.store().exists("best_model_classification"));
    assert!(env.store().exists("experiment_classification"));
}
