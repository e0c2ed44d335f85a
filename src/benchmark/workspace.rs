//! Scratch workspaces for benchmark runs
//!
//! Each run gets a freshly created, uniquely named directory holding the source
//! files and the input fixture. The directory is bind-mounted into every
//! sandbox container and removed when the [`Workspace`] is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{
    constants::{files, WORKSPACE_PREFIX},
    error::{AppError, AppResult},
};

/// A source file to materialize in the workspace
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Isolated scratch directory owned by one benchmark run
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create a workspace under `root` and write the sources and input fixture.
    pub fn create(root: &Path, sources: &[SourceFile], input: &[u8]) -> AppResult<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            AppError::Workspace(format!(
                "Failed to create workspace root {}: {}",
                root.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| AppError::Workspace(format!("Failed to create workspace: {}", e)))?;
        let path = dir.path().to_path_buf();

        for source in sources {
            validate_file_name(&source.name)?;
            write_file(&path.join(&source.name), source.content.as_bytes())?;
        }
        write_file(&path.join(files::INPUT), input)?;

        tracing::debug!(workspace = %path.display(), files = sources.len() + 1, "Workspace created");

        Ok(Self {
            dir: Some(dir),
            path,
            keep: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory on disk after the workspace is dropped
    pub fn retain(&mut self) {
        self.keep = true;
    }

    /// Release the workspace now, reporting removal failures
    pub fn release(mut self) -> AppResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        if self.keep {
            let path = dir.keep();
            tracing::info!(workspace = %path.display(), "Workspace retained for inspection");
            return Ok(());
        }

        dir.close().map_err(|e| {
            AppError::Workspace(format!(
                "Failed to remove workspace {}: {}",
                self.path.display(),
                e
            ))
        })?;
        tracing::debug!(workspace = %self.path.display(), "Workspace removed");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.keep {
                let path = dir.keep();
                tracing::info!(workspace = %path.display(), "Workspace retained for inspection");
            } else if let Err(e) = dir.close() {
                tracing::warn!(workspace = %self.path.display(), "Failed to cleanup workspace: {}", e);
            }
        }
    }
}

/// Only plain file names are allowed; nothing may escape the workspace
fn validate_file_name(name: &str) -> AppResult<()> {
    let path = Path::new(name);
    let plain = path.components().count() == 1
        && path.file_name().map(|f| f == path.as_os_str()).unwrap_or(false);

    if name.is_empty() || !plain || name == files::INPUT {
        return Err(AppError::InvalidInput(format!(
            "Invalid workspace file name: '{}'",
            name
        )));
    }
    Ok(())
}

fn write_file(path: &Path, content: &[u8]) -> AppResult<()> {
    std::fs::write(path, content).map_err(|e| {
        AppError::Workspace(format!("Failed to write {}: {}", path.display(), e))
    })
}
