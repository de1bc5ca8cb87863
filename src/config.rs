//! Runtime settings: optional JSON file, then environment overrides.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "TABFLOW_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Downloaded and uploaded datasets.
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub models_dir: PathBuf,
    pub plots_dir: PathBuf,
    /// Base of the fixed artifact slot; the task type is appended.
    pub artifact_base: String,
    pub session_seed: u64,
    pub profile_timeout_secs: u64,
    pub default_clusters: usize,
    pub registry: RegistrySettings,
    pub editor: EditorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            reports_dir: PathBuf::from("reports"),
            models_dir: PathBuf::from("models"),
            plots_dir: PathBuf::from("plots"),
            artifact_base: "best_model".to_string(),
            session_seed: 123,
            profile_timeout_secs: 600,
            default_clusters: 3,
            registry: RegistrySettings::default(),
            editor: EditorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    #[default]
    Kaggle,
    Local,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RegistrySettings {
    pub kind: RegistryKind,
    /// Root of the local registry (`<root>/<owner>/<dataset>/`).
    pub local_root: Option<PathBuf>,
}

/// External interactive editor launched on a working copy of the dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub program: String,
    /// `{path}`, `{host}` and `{port}` are substituted.
    pub args: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            program: "dtale".to_string(),
            args: ["--host", "{host}", "--port", "{port}", "--csv-path", "{path}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            host: "localhost".to_string(),
            port: 40000,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or `$TABFLOW_CONFIG`) if given, then apply
    /// `TABFLOW_*_DIR` / `TABFLOW_ARTIFACT_BASE` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut settings = match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing settings {}", path.display()))
    }

    fn apply_env(&mut self) {
        let dirs = [
            ("TABFLOW_DATA_DIR", &mut self.data_dir),
            ("TABFLOW_REPORTS_DIR", &mut self.reports_dir),
            ("TABFLOW_MODELS_DIR", &mut self.models_dir),
            ("TABFLOW_PLOTS_DIR", &mut self.plots_dir),
        ];
        for (key, slot) in dirs {
            if let Some(v) = env::var_os(key) {
                *slot = PathBuf::from(v);
            }
        }
        if let Ok(base) = env::var("TABFLOW_ARTIFACT_BASE") {
            if !base.trim().is_empty() {
                self.artifact_base = base;
            }
        }
    }

    /// All storage paths re-rooted under `root`. Used to give each session or
    /// test its own storage area.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            reports_dir: root.join("reports"),
            models_dir: root.join("models"),
            plots_dir: root.join("plots"),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = std::env::temp_dir().join(format!("tabflow-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "artifact_base": "churn_model",
                "registry": { "kind": "local", "local_root": "/srv/registry" }
            }"#,
        )
        .unwrap();

        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.artifact_base, "churn_model");
        assert_eq!(s.registry.kind, RegistryKind::Local);
        assert_eq!(s.data_dir, PathBuf::from("data"));
        assert_eq!(s.session_seed, 123);
        assert_eq!(s.editor.program, "dtale");
    }

    #[test]
    fn rooted_settings_share_one_root() {
        let s = Settings::rooted_at(Path::new("/tmp/x"));
        assert_eq!(s.models_dir, PathBuf::from("/tmp/x/models"));
        assert_eq!(s.artifact_base, "best_model");
    }
}
