//! Benchmark repository

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{BenchmarkRecord, validate_problem_id},
};

/// A persisted record with its identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBenchmark {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: BenchmarkRecord,
}

/// The benchmark currently used for grading a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBenchmark {
    pub problem_id: String,
    pub benchmark_id: Uuid,
    pub set_by: String,
    pub set_at: DateTime<Utc>,
}

/// Storage for benchmark records and the active selection per problem
#[async_trait]
pub trait BenchmarkRepository: Send + Sync {
    /// Persist a record and return its new identifier
    async fn save(&self, record: &BenchmarkRecord) -> AppResult<Uuid>;

    /// Mark a saved benchmark as the active one for its problem
    async fn activate(
        &self,
        problem_id: &str,
        benchmark_id: &Uuid,
        set_by: &str,
    ) -> AppResult<ActiveBenchmark>;

    /// Find a saved benchmark by ID
    async fn find_by_id(&self, problem_id: &str, id: &Uuid) -> AppResult<Option<StoredBenchmark>>;

    /// Get the active benchmark selection for a problem
    async fn find_active(&self, problem_id: &str) -> AppResult<Option<ActiveBenchmark>>;
}

/// Repository writing one JSON document per record.
///
/// Layout: `<root>/<problem_id>/<benchmark_id>.json` plus
/// `<root>/<problem_id>/active.json`.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn problem_dir(&self, problem_id: &str) -> AppResult<PathBuf> {
        validate_problem_id(problem_id)?;
        Ok(self.root.join(problem_id))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> AppResult<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Write through a temporary file so readers never see partial JSON
    async fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, bytes).await.map_err(|e| {
            AppError::Persistence(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).await.map_err(|e| {
            AppError::Persistence(format!("Failed to move {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl BenchmarkRepository for JsonFileRepository {
    async fn save(&self, record: &BenchmarkRecord) -> AppResult<Uuid> {
        let dir = self.problem_dir(&record.problem_id)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Persistence(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let id = Uuid::new_v4();
        let stored = StoredBenchmark {
            id,
            record: record.clone(),
        };
        Self::write_json(&dir.join(format!("{}.json", id)), &stored).await?;

        tracing::info!(problem_id = %record.problem_id, benchmark_id = %id, "Benchmark saved");
        Ok(id)
    }

    async fn activate(
        &self,
        problem_id: &str,
        benchmark_id: &Uuid,
        set_by: &str,
    ) -> AppResult<ActiveBenchmark> {
        if self.find_by_id(problem_id, benchmark_id).await?.is_none() {
            return Err(AppError::Persistence(format!(
                "Benchmark {} not found for problem {}",
                benchmark_id, problem_id
            )));
        }

        let active = ActiveBenchmark {
            problem_id: problem_id.to_string(),
            benchmark_id: *benchmark_id,
            set_by: set_by.to_string(),
            set_at: Utc::now(),
        };
        Self::write_json(&self.problem_dir(problem_id)?.join("active.json"), &active).await?;

        tracing::info!(problem_id, benchmark_id = %benchmark_id, set_by, "Benchmark activated");
        Ok(active)
    }

    async fn find_by_id(&self, problem_id: &str, id: &Uuid) -> AppResult<Option<StoredBenchmark>> {
        let path = self.problem_dir(problem_id)?.join(format!("{}.json", id));
        Self::read_json(&path).await
    }

    async fn find_active(&self, problem_id: &str) -> AppResult<Option<ActiveBenchmark>> {
        let path = self.problem_dir(problem_id)?.join("active.json");
        Self::read_json(&path).await
    }
}
