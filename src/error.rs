//! Failure taxonomy shared by ports and the orchestrator.

use std::fmt;

use thiserror::Error;

/// Classified failure reported by a port or detected by the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Registry credentials are missing or rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A remote dataset or local file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage or file access failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Bad task-type / target-column combination, or a missing prerequisite.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("profiling failed: {0}")]
    Profiling(String),

    /// Plot generation failed for a plot kind that is otherwise allowed.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("plot '{plot}' is not available for {task} (allowed: {allowed})")]
    UnsupportedPlot {
        plot: String,
        task: String,
        allowed: String,
    },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No persisted model artifact under the requested name.
    #[error("model artifact '{0}' not found; train a model first")]
    ArtifactNotFound(String),
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => PortError::NotFound(err.to_string()),
            _ => PortError::Io(err.to_string()),
        }
    }
}

/// Result alias used by the port traits.
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Workflow stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Load,
    Profile,
    Edit,
    Resync,
    Configure,
    Train,
    Plot,
    Score,
    Predict,
    Artifact,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Load => "load",
            Stage::Profile => "profile",
            Stage::Edit => "edit",
            Stage::Resync => "resync",
            Stage::Configure => "configure",
            Stage::Train => "train",
            Stage::Plot => "plot",
            Stage::Score => "score",
            Stage::Predict => "predict",
            Stage::Artifact => "artifact",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure tagged with the stage that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PortError,
}

impl StageError {
    pub fn new(stage: Stage, source: PortError) -> Self {
        Self { stage, source }
    }

    pub fn kind(&self) -> &PortError {
        &self.source
    }
}

/// Result alias for orchestrator operations.
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Attach a stage to a port result.
pub trait InStage<T> {
    fn in_stage(self, stage: Stage) -> StageResult<T>;
}

impl<T> InStage<T> for PortResult<T> {
    fn in_stage(self, stage: Stage) -> StageResult<T> {
        self.map_err(|source| StageError::new(stage, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_message_names_stage_and_cause() {
        let err = StageError::new(
            Stage::Train,
            PortError::InvalidConfiguration("target 'price' is not a column".into()),
        );
        assert_eq!(
            err.to_string(),
            "train failed: invalid configuration: target 'price' is not a column"
        );
    }

    #[test]
    fn io_not_found_is_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        assert!(matches!(PortError::from(io), PortError::NotFound(_)));
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        assert!(matches!(PortError::from(io), PortError::Io(_)));
    }

    #[test]
    fn unsupported_plot_lists_allowed_kinds() {
        let err = PortError::UnsupportedPlot {
            plot: "auc".into(),
            task: "regression".into(),
            allowed: "residuals, error".into(),
        };
        assert_eq!(
            err.to_string(),
            "plot 'auc' is not available for regression (allowed: residuals, error)"
        );
    }
}
