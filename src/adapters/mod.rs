/// Concrete adapters for the ports, one per external tool.
///
/// ```text
///   DatasetSource      ← registry::{KaggleSource, LocalRegistry}
///   Profiler           ← profiler::SummaryProfiler
///   InteractiveEditor  ← editor::ProcessEditor
///   Trainer            ← baseline::BaselineTrainer
/// ```

pub mod baseline;
pub mod editor;
pub mod profiler;
pub mod registry;

use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::config::{RegistryKind, Settings};
use crate::ports::{DatasetSource, Ports};

/// Wire the default adapter for every port from `settings`.
pub fn default_ports(settings: &Settings) -> Ports {
    let source: Arc<dyn DatasetSource> = match settings.registry.kind {
        RegistryKind::Kaggle => Arc::new(registry::KaggleSource::default()),
        RegistryKind::Local => {
            let root = settings
                .registry
                .local_root
                .clone()
                .unwrap_or_else(|| settings.data_dir.join("registry"));
            Arc::new(registry::LocalRegistry::new(root))
        }
    };

    Ports {
        source,
        profiler: Arc::new(profiler::SummaryProfiler::new(&settings.reports_dir)),
        editor: Arc::new(editor::ProcessEditor::new(
            settings.editor.clone(),
            &settings.data_dir,
        )),
        trainer: Arc::new(baseline::BaselineTrainer::new(
            ArtifactStore::new(&settings.models_dir),
            &settings.plots_dir,
        )),
    }
}
