//! Sandbox image provisioning

use std::sync::Arc;

use crate::error::{AppError, AppResult};

use super::container::{BuildSpec, SandboxRuntime};

/// Ensures sandbox images exist locally, building them on demand.
///
/// Concurrent callers may race to build the same tag; the worst case is a
/// redundant build.
#[derive(Clone)]
pub struct ImageProvisioner {
    runtime: Arc<dyn SandboxRuntime>,
}

impl ImageProvisioner {
    pub fn new(runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self { runtime }
    }

    /// Build `tag` from `spec` unless it is already present
    pub async fn ensure(&self, tag: &str, spec: &BuildSpec) -> AppResult<()> {
        let exists = self.runtime.image_exists(tag).await.map_err(|e| {
            AppError::Provisioning(format!("Failed to inspect image {}: {}", tag, e))
        })?;

        if exists {
            tracing::debug!(image = %tag, "Image present");
            return Ok(());
        }

        tracing::info!(
            image = %tag,
            dockerfile = %spec.dockerfile.display(),
            "Building missing image"
        );

        self.runtime.build(tag, spec).await.map_err(|e| match e {
            AppError::Provisioning(_) => e,
            other => AppError::Provisioning(format!("Failed to build {}: {}", tag, other)),
        })?;

        tracing::info!(image = %tag, "Image built");
        Ok(())
    }
}
