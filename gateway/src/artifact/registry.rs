//! Artifact registry: loads each family's bundle once and caches it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;

use modelhub_common::{ArtifactStatus, ModelFamily};

use super::{ArtifactBundle, ArtifactError, ArtifactSource};

type LoadResult = Result<Arc<ArtifactBundle>, ArtifactError>;
type Slot = Arc<OnceCell<LoadResult>>;

/// Process-wide cache of artifact bundles.
///
/// The first `get` for a family performs the load; concurrent callers wait
/// on that same attempt. The outcome, success or failure, is kept for the
/// lifetime of the registry, so a family whose artifact is missing stays
/// unavailable until restart.
pub struct ArtifactRegistry {
    source: Arc<dyn ArtifactSource>,
    slots: HashMap<ModelFamily, Slot>,
}

impl ArtifactRegistry {
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        let slots = ModelFamily::ALL
            .into_iter()
            .filter(ModelFamily::requires_artifact)
            .map(|family| (family, Arc::new(OnceCell::new())))
            .collect();
        Self { source, slots }
    }

    /// Get the bundle for a family, loading it on first access.
    pub async fn get(&self, family: ModelFamily) -> LoadResult {
        let slot = self
            .slots
            .get(&family)
            .ok_or(ArtifactError::NoArtifact(family))?;

        if let Some(outcome) = slot.get() {
            return outcome.clone();
        }

        // The cell is filled from its own task: dropping this future must
        // not leave the slot empty while the blocking load still runs.
        let slot = slot.clone();
        let source = self.source.clone();
        tokio::spawn(async move { slot.get_or_init(|| load(source, family)).await.clone() })
            .await
            .map_err(|e| ArtifactError::Aborted(e.to_string()))
            .and_then(|r| r)
    }

    /// Eagerly load every artifact-backed family.
    ///
    /// Failures are logged and cached like any other load; startup continues.
    pub async fn preload(&self) {
        for family in self.families() {
            if self.get(family).await.is_ok() {
                tracing::info!(family = %family, "Preloaded model artifacts");
            }
        }
    }

    /// Current load state of a family.
    pub fn status(&self, family: ModelFamily) -> ArtifactStatus {
        let Some(slot) = self.slots.get(&family) else {
            return ArtifactStatus::Remote;
        };
        match slot.get() {
            None => ArtifactStatus::Unloaded,
            Some(Ok(_)) => ArtifactStatus::Loaded,
            Some(Err(e)) => ArtifactStatus::Unavailable {
                message: e.to_string(),
            },
        }
    }

    fn families(&self) -> Vec<ModelFamily> {
        ModelFamily::ALL
            .into_iter()
            .filter(|f| self.slots.contains_key(f))
            .collect()
    }
}

async fn load(source: Arc<dyn ArtifactSource>, family: ModelFamily) -> LoadResult {
    tracing::info!(family = %family, "Loading model artifacts on first use");
    let loaded = tokio::task::spawn_blocking(move || source.load(family))
        .await
        .map_err(|e| ArtifactError::Aborted(e.to_string()))
        .and_then(|r| r);

    match loaded {
        Ok(bundle) => Ok(Arc::new(bundle)),
        Err(e) => {
            tracing::error!(
                family = %family,
                error = %e,
                "Artifact load failed; family unavailable until restart"
            );
            Err(e)
        }
    }
}
