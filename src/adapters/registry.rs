//! Dataset Source adapters: the Kaggle CLI and a local directory registry.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use serde::Deserialize;

use crate::error::{PortError, PortResult};
use crate::ports::DatasetSource;

/// Split `owner/dataset`, rejecting anything else.
fn parse_identifier(dataset: &str) -> PortResult<(&str, &str)> {
    match dataset.split_once('/') {
        Some((owner, name))
            if !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && owner != ".."
                && name != ".." =>
        {
            Ok((owner, name))
        }
        _ => Err(PortError::NotFound(format!(
            "'{dataset}' is not a dataset identifier (expected owner/dataset)"
        ))),
    }
}

fn list_files(dir: &Path) -> PortResult<BTreeSet<PathBuf>> {
    let mut out = BTreeSet::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            out.insert(path);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Kaggle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct KaggleCredentials {
    username: String,
    key: String,
}

/// Kaggle registry reached through the official `kaggle` command-line client.
pub struct KaggleSource {
    program: String,
    credentials: Mutex<Option<KaggleCredentials>>,
}

impl Default for KaggleSource {
    fn default() -> Self {
        Self::new("kaggle")
    }
}

impl KaggleSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            credentials: Mutex::new(None),
        }
    }

    /// `KAGGLE_USERNAME`/`KAGGLE_KEY`, else `kaggle.json` in `KAGGLE_CONFIG_DIR`
    /// or `~/.kaggle`.
    fn discover_credentials() -> PortResult<KaggleCredentials> {
        if let (Ok(username), Ok(key)) = (env::var("KAGGLE_USERNAME"), env::var("KAGGLE_KEY")) {
            if !username.is_empty() && !key.is_empty() {
                return Ok(KaggleCredentials { username, key });
            }
        }

        let dir = env::var_os("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".kaggle")))
            .ok_or_else(|| {
                PortError::Authentication(
                    "no KAGGLE_USERNAME/KAGGLE_KEY and no home directory".into(),
                )
            })?;
        let file = dir.join("kaggle.json");
        let text = fs::read_to_string(&file).map_err(|e| {
            PortError::Authentication(format!("cannot read {}: {e}", file.display()))
        })?;
        let creds: KaggleCredentials = serde_json::from_str(&text).map_err(|e| {
            PortError::Authentication(format!("malformed {}: {e}", file.display()))
        })?;
        if creds.username.is_empty() || creds.key.is_empty() {
            return Err(PortError::Authentication(format!(
                "empty credentials in {}",
                file.display()
            )));
        }
        Ok(creds)
    }

    fn credentials(&self) -> PortResult<KaggleCredentials> {
        let mut slot = self
            .credentials
            .lock()
            .map_err(|_| PortError::Authentication("credential cache poisoned".into()))?;
        if let Some(creds) = slot.as_ref() {
            return Ok(creds.clone());
        }
        let creds = Self::discover_credentials()?;
        *slot = Some(creds.clone());
        Ok(creds)
    }
}

impl DatasetSource for KaggleSource {
    fn authenticate(&self) -> PortResult<()> {
        let creds = self.credentials()?;
        log::debug!("kaggle credentials found for user '{}'", creds.username);
        Ok(())
    }

    fn download(&self, dataset: &str, destination: &Path) -> PortResult<Vec<PathBuf>> {
        parse_identifier(dataset)?;
        let creds = self.credentials()?;
        fs::create_dir_all(destination)?;
        let before = list_files(destination)?;

        let output = Command::new(&self.program)
            .args(["datasets", "download", "-d", dataset, "-p"])
            .arg(destination)
            .arg("--unzip")
            .env("KAGGLE_USERNAME", &creds.username)
            .env("KAGGLE_KEY", &creds.key)
            .output()
            .map_err(|e| PortError::Io(format!("cannot run '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim().to_string();
            return Err(if message.contains("404") || message.contains("Not Found") {
                PortError::NotFound(format!("dataset '{dataset}': {message}"))
            } else if message.contains("401") || message.contains("403") {
                PortError::Authentication(message)
            } else {
                PortError::Io(format!("kaggle exited with {}: {message}", output.status))
            });
        }

        let after = list_files(destination)?;
        let written: Vec<PathBuf> = after.difference(&before).cloned().collect();
        // Re-downloads overwrite in place, so fall back to everything present.
        Ok(if written.is_empty() { after.into_iter().collect() } else { written })
    }
}

// ---------------------------------------------------------------------------
// Local directory registry
// ---------------------------------------------------------------------------

/// Registry laid out as `<root>/<owner>/<dataset>/<files>`.
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DatasetSource for LocalRegistry {
    fn authenticate(&self) -> PortResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(PortError::Authentication(format!(
                "registry root {} is not accessible",
                self.root.display()
            )))
        }
    }

    fn download(&self, dataset: &str, destination: &Path) -> PortResult<Vec<PathBuf>> {
        let (owner, name) = parse_identifier(dataset)?;
        let source = self.root.join(owner).join(name);
        if !source.is_dir() {
            return Err(PortError::NotFound(format!("dataset '{dataset}'")));
        }
        fs::create_dir_all(destination)?;

        let mut written = Vec::new();
        for file in list_files(&source)? {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let target = destination.join(file_name);
            fs::copy(&file, &target)?;
            written.push(target);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(tag: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("tabflow-registry-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(parse_identifier("owner/data").is_ok());
        for bad in ["nodelimiter", "/data", "owner/", "a/b/c", "../x"] {
            assert!(matches!(parse_identifier(bad), Err(PortError::NotFound(_))), "{bad}");
        }
    }

    #[test]
    fn local_registry_copies_dataset_files() {
        let root = scratch("local");
        let ds_dir = root.join("registry").join("acme").join("churn");
        fs::create_dir_all(&ds_dir).unwrap();
        fs::write(ds_dir.join("churn.csv"), "a,b\n1,2\n").unwrap();

        let source = LocalRegistry::new(root.join("registry"));
        source.authenticate().unwrap();
        let files = source.download("acme/churn", &root.join("data")).unwrap();

        assert_eq!(files, vec![root.join("data").join("churn.csv")]);
        assert!(files[0].is_file());
    }

    #[test]
    fn local_registry_unknown_dataset_is_not_found() {
        let root = scratch("unknown");
        let source = LocalRegistry::new(&root);
        assert!(matches!(
            source.download("acme/missing", &root.join("data")),
            Err(PortError::NotFound(_))
        ));
    }

    #[test]
    fn missing_registry_root_fails_authentication() {
        let source = LocalRegistry::new("/definitely/not/here");
        assert!(matches!(source.authenticate(), Err(PortError::Authentication(_))));
    }
}
