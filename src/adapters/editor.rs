//! Interactive editor adapter: spawns an external browser/editor process on a
//! working copy and returns without waiting for it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::EditorSettings;
use crate::data::loader;
use crate::data::TabularDataset;
use crate::error::{PortError, PortResult};
use crate::ports::{InteractiveEditor, SessionHandle};

pub struct ProcessEditor {
    settings: EditorSettings,
    workspace: PathBuf,
}

impl ProcessEditor {
    /// Working copies are written to `workspace`.
    pub fn new(settings: EditorSettings, workspace: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            workspace: workspace.into(),
        }
    }

    /// `<workspace>/<stem>.edit.csv`
    pub fn working_copy_path(&self, dataset: &TabularDataset) -> PathBuf {
        let stem = Path::new(dataset.name())
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("dataset");
        self.workspace.join(format!("{stem}.edit.csv"))
    }

    fn locator(&self) -> String {
        format!("http://{}:{}", self.settings.host, self.settings.port)
    }

    fn expand_args(&self, working_copy: &Path) -> Vec<String> {
        let path = working_copy.display().to_string();
        let port = self.settings.port.to_string();
        self.settings
            .args
            .iter()
            .map(|a| {
                a.replace("{path}", &path)
                    .replace("{host}", &self.settings.host)
                    .replace("{port}", &port)
            })
            .collect()
    }
}

impl InteractiveEditor for ProcessEditor {
    fn edit(&self, dataset: &TabularDataset) -> PortResult<SessionHandle> {
        fs::create_dir_all(&self.workspace)?;
        let working_copy = self.working_copy_path(dataset);
        loader::write_csv(dataset, &working_copy)
            .map_err(|e| PortError::Io(format!("{e:#}")))?;

        let child = Command::new(&self.settings.program)
            .args(self.expand_args(&working_copy))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PortError::Io(format!("cannot launch '{}': {e}", self.settings.program)))?;

        // The child is deliberately not waited on; it outlives this call.
        let pid = child.id();
        log::info!(
            "editor '{}' started (pid {pid}) on {}",
            self.settings.program,
            working_copy.display()
        );
        Ok(SessionHandle {
            locator: self.locator(),
            working_copy,
            pid: Some(pid),
        })
    }
}
