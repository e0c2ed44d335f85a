//! Benchmark service - Runs calibrations and persists their records

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    benchmark::{BenchmarkRequest, BenchmarkRunner},
    db::repositories::{ActiveBenchmark, BenchmarkRepository},
    error::AppResult,
    models::BenchmarkRecord,
};

/// Benchmark service tying the runner to storage
pub struct BenchmarkService {
    runner: BenchmarkRunner,
    repository: Arc<dyn BenchmarkRepository>,
}

impl BenchmarkService {
    pub fn new(runner: BenchmarkRunner, repository: Arc<dyn BenchmarkRepository>) -> Self {
        Self { runner, repository }
    }

    /// Run a calibration, store the record and optionally make it active.
    ///
    /// Nothing is written when the run fails.
    pub async fn calibrate(
        &self,
        request: &BenchmarkRequest,
        activate_as: Option<&str>,
    ) -> AppResult<(Uuid, BenchmarkRecord)> {
        let record = self.runner.run(request).await?;
        let id = self.repository.save(&record).await?;

        if let Some(set_by) = activate_as {
            self.repository
                .activate(&record.problem_id, &id, set_by)
                .await?;
        }

        tracing::info!(
            problem_id = %record.problem_id,
            benchmark_id = %id,
            factor = ?record.adjustment_factor,
            status = ?record.calibration_status,
            "Calibration stored"
        );

        Ok((id, record))
    }

    /// Currently active benchmark for a problem
    pub async fn active(&self, problem_id: &str) -> AppResult<Option<ActiveBenchmark>> {
        self.repository.find_active(problem_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        benchmark::{
            LanguageSubmission,
            container::{MockSandboxRuntime, RunOutput, RunStatus},
        },
        config::{BenchmarkConfig, ImageConfig},
        db::repositories::JsonFileRepository,
        models::{CalibrationStatus, PolicyTable},
    };

    fn request() -> BenchmarkRequest {
        BenchmarkRequest {
            problem_id: "sum-range".to_string(),
            reference: LanguageSubmission::new("cpp", "int main() {}"),
            target: LanguageSubmission::new("python", "print(1)"),
            input: b"2000000\n".to_vec(),
            factor_cap: Some(12.0),
        }
    }

    fn service(
        runtime: MockSandboxRuntime,
        workspaces: &std::path::Path,
        storage: &std::path::Path,
    ) -> BenchmarkService {
        let runner = BenchmarkRunner::new(
            Arc::new(runtime),
            BenchmarkConfig {
                workspace_root: workspaces.to_path_buf(),
                ..Default::default()
            },
            ImageConfig::default(),
            PolicyTable::default(),
        );
        BenchmarkService::new(runner, Arc::new(JsonFileRepository::new(storage)))
    }

    fn succeeding_runtime() -> MockSandboxRuntime {
        let mut runtime = MockSandboxRuntime::new();
        runtime.expect_image_exists().returning(|_| Ok(true));
        runtime.expect_run().returning(|req| {
            let elapsed = if req.command.starts_with("python3") {
                Duration::from_millis(1500)
            } else {
                Duration::from_millis(300)
            };
            Ok(RunOutput {
                elapsed,
                status: RunStatus::Exited {
                    exit_code: 0,
                    stderr: String::new(),
                    oom_killed: false,
                },
            })
        });
        runtime
    }

    #[tokio::test]
    async fn test_calibrate_saves_and_activates() {
        let workspaces = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let service = service(succeeding_runtime(), workspaces.path(), storage.path());

        let (id, record) = service.calibrate(&request(), Some("admin")).await.unwrap();

        assert_eq!(record.calibration_status, CalibrationStatus::Calibrated);
        assert!((record.adjustment_factor.unwrap() - 5.0).abs() < 1e-9);

        let active = service.active("sum-range").await.unwrap().unwrap();
        assert_eq!(active.benchmark_id, id);
        assert_eq!(active.set_by, "admin");
    }

    #[tokio::test]
    async fn test_calibrate_without_activation() {
        let workspaces = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let service = service(succeeding_runtime(), workspaces.path(), storage.path());

        let (id, _) = service.calibrate(&request(), None).await.unwrap();

        assert!(service.active("sum-range").await.unwrap().is_none());
        assert!(
            storage
                .path()
                .join("sum-range")
                .join(format!("{}.json", id))
                .exists()
        );
    }

    #[tokio::test]
    async fn test_failed_run_stores_nothing() {
        let workspaces = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();

        let mut runtime = MockSandboxRuntime::new();
        runtime.expect_image_exists().returning(|_| Ok(false));
        runtime
            .expect_build()
            .returning(|_, _| Err(crate::AppError::Provisioning("build failed".to_string())));
        runtime.expect_run().never();

        let service = service(runtime, workspaces.path(), storage.path());
        let err = service.calibrate(&request(), Some("admin")).await.unwrap_err();

        assert_eq!(err.error_code(), "PROVISIONING_ERROR");
        assert!(!storage.path().join("sum-range").exists());
    }
}
