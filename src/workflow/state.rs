use std::fmt;

use crate::data::TabularDataset;
use crate::ports::SessionHandle;
use crate::task::{TaskType, TrainingConfig};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Workflow position of a session.
///
/// ```text
///   Idle ─load─▶ DataLoaded ─configure─▶ Configured ─train─▶ Trained
///     ▲              ▲                                          │
///     │              │                                        score
///     │              │                                          ▼
///     └──────────────┴──── load another dataset ◀──── ReadyForPrediction
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DataLoaded,
    Configured,
    Trained,
    ReadyForPrediction,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::DataLoaded => "data loaded",
            SessionState::Configured => "configured",
            SessionState::Trained => "trained",
            SessionState::ReadyForPrediction => "ready for prediction",
        };
        f.write_str(s)
    }
}

/// Reference to the artifact produced (or found) for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainedModel {
    pub artifact_name: String,
    pub task: TaskType,
    pub target: Option<String>,
}

/// References held for the duration of a session. The state is derived from
/// which references are present, so it cannot drift from them.
#[derive(Debug, Default)]
pub struct Session {
    pub(super) dataset: Option<TabularDataset>,
    pub(super) config: Option<TrainingConfig>,
    pub(super) trained: Option<TrainedModel>,
    pub(super) scoring: Option<TabularDataset>,
    pub(super) editor: Option<SessionHandle>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        match (&self.dataset, &self.config, &self.trained, &self.scoring) {
            (_, _, Some(_), Some(_)) => SessionState::ReadyForPrediction,
            (_, _, Some(_), None) => SessionState::Trained,
            (Some(_), Some(_), None, _) => SessionState::Configured,
            (Some(_), None, None, _) => SessionState::DataLoaded,
            (None, _, None, _) => SessionState::Idle,
        }
    }

    /// Replace the working dataset. Everything derived from the previous
    /// one is dropped: configuration, trained model and scoring data.
    pub(super) fn replace_dataset(&mut self, dataset: TabularDataset) -> &TabularDataset {
        self.config = None;
        self.trained = None;
        self.scoring = None;
        self.dataset.insert(dataset)
    }

    pub(super) fn set_config(&mut self, config: TrainingConfig) -> &TrainingConfig {
        self.trained = None;
        self.scoring = None;
        self.config.insert(config)
    }

    pub(super) fn set_trained(&mut self, trained: TrainedModel) -> &TrainedModel {
        self.scoring = None;
        self.trained.insert(trained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Value};

    fn ds() -> TabularDataset {
        TabularDataset::new("d.csv", vec![Column::new("a", vec![Value::Integer(1)])]).unwrap()
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            task: TaskType::Clustering,
            target: None,
            clusters: 3,
            seed: 1,
        }
    }

    fn trained() -> TrainedModel {
        TrainedModel {
            artifact_name: "m_clustering".into(),
            task: TaskType::Clustering,
            target: None,
        }
    }

    #[test]
    fn state_follows_held_references() {
        let mut s = Session::default();
        assert_eq!(s.state(), SessionState::Idle);
        s.replace_dataset(ds());
        assert_eq!(s.state(), SessionState::DataLoaded);
        s.set_config(config());
        assert_eq!(s.state(), SessionState::Configured);
        s.set_trained(trained());
        assert_eq!(s.state(), SessionState::Trained);
        s.scoring = Some(ds());
        assert_eq!(s.state(), SessionState::ReadyForPrediction);
    }

    #[test]
    fn new_dataset_invalidates_downstream() {
        let mut s = Session::default();
        s.replace_dataset(ds());
        s.set_config(config());
        s.set_trained(trained());
        s.scoring = Some(ds());

        s.replace_dataset(ds());
        assert_eq!(s.state(), SessionState::DataLoaded);
        assert!(s.trained.is_none());
        assert!(s.config.is_none());
    }
}
