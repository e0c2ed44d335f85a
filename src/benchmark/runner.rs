//! Benchmark runner - Orchestrates one calibration run
//!
//! Strictly sequential: provision images, materialize the workspace, compile
//! outside any timing window, sample the target fully, then sample the
//! reference fully. A run either returns a complete record or fails before
//! the first measured sample.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::{BenchmarkConfig, ImageConfig},
    constants::BENCHMARK_SCHEMA_VERSION,
    error::{AppError, AppResult},
    models::{
        BenchmarkRecord, LanguagePolicy, LanguageReport, PolicyTable, RunLimits,
        validate_problem_id,
    },
};

use super::{
    calibration,
    container::{BuildSpec, SandboxRuntime},
    executor::{Invocation, SandboxExecutor},
    images::ImageProvisioner,
    languages::LanguageHandler,
    metrics,
    sampler::RepeatedSampler,
    workspace::{SourceFile, Workspace},
};

/// A solution in one language
#[derive(Debug, Clone)]
pub struct LanguageSubmission {
    pub language: String,
    pub source: String,
}

impl LanguageSubmission {
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
        }
    }
}

/// Inputs for one calibration run
#[derive(Debug, Clone)]
pub struct BenchmarkRequest {
    pub problem_id: String,
    /// Fast baseline implementation
    pub reference: LanguageSubmission,
    /// Implementation being calibrated
    pub target: LanguageSubmission,
    /// Canonical input fixture, piped to every invocation
    pub input: Vec<u8>,
    /// Factor injected when the target never succeeds
    pub factor_cap: Option<f64>,
}

/// Everything resolved for one side of the comparison
struct Side {
    handler: LanguageHandler,
    image: String,
    dockerfile: BuildSpec,
    policy: LanguagePolicy,
}

/// Runs calibrations against a sandbox runtime
pub struct BenchmarkRunner {
    executor: SandboxExecutor,
    provisioner: ImageProvisioner,
    config: BenchmarkConfig,
    images: ImageConfig,
    policies: PolicyTable,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        config: BenchmarkConfig,
        images: ImageConfig,
        policies: PolicyTable,
    ) -> Self {
        Self {
            executor: SandboxExecutor::new(runtime.clone(), config.clock_start),
            provisioner: ImageProvisioner::new(runtime),
            config,
            images,
            policies,
        }
    }

    /// Run one calibration and build its record
    #[tracing::instrument(skip_all, fields(problem_id = %request.problem_id))]
    pub async fn run(&self, request: &BenchmarkRequest) -> AppResult<BenchmarkRecord> {
        let (reference, target) = self.resolve(request)?;

        // Images first: a failed build aborts before any workspace exists
        self.provisioner
            .ensure(&reference.image, &reference.dockerfile)
            .await?;
        self.provisioner.ensure(&target.image, &target.dockerfile).await?;

        let mut workspace = Workspace::create(
            &self.config.workspace_root,
            &[
                SourceFile::new(reference.handler.source_file(), &request.reference.source),
                SourceFile::new(target.handler.source_file(), &request.target.source),
            ],
            &request.input,
        )?;
        if self.config.keep_workspace {
            workspace.retain();
        }

        for side in [&reference, &target] {
            if let Some(command) = side.handler.compile_command() {
                tracing::info!(language = side.handler.language(), "Compiling");
                self.executor
                    .compile(workspace.path(), &self.invocation(side, command, None))
                    .await?;
            }
        }

        let sampler = RepeatedSampler::new(self.config.warmup_count, self.config.repeat_count);
        let stdin = Some(request.input.clone());

        tracing::info!(language = target.handler.language(), "Sampling target");
        let target_samples = sampler
            .sample(
                &self.executor,
                workspace.path(),
                &self.invocation(&target, target.handler.run_command(), stdin.clone()),
            )
            .await;

        tracing::info!(language = reference.handler.language(), "Sampling reference");
        let reference_samples = sampler
            .sample(
                &self.executor,
                workspace.path(),
                &self.invocation(&reference, reference.handler.run_command(), stdin),
            )
            .await;

        let reference_stats =
            metrics::aggregate(&reference_samples, reference.policy.stability_threshold_pct);
        let target_stats = metrics::aggregate(&target_samples, target.policy.stability_threshold_pct);

        let calibration = calibration::compute(&reference_stats, &target_stats, request.factor_cap);
        let mut notes = calibration.notes.clone();
        notes.extend(calibration::policy_notes(&calibration, &target.policy));

        tracing::info!(
            reference_median = ?reference_stats.median,
            reference_status = %reference_stats.status,
            target_median = ?target_stats.median,
            target_status = %target_stats.status,
            factor = ?calibration.factor,
            "Calibration finished"
        );

        let record = BenchmarkRecord {
            problem_id: request.problem_id.clone(),
            created_at: Utc::now(),
            resource_limits: RunLimits {
                reference: reference.policy.limits(),
                target: target.policy.limits(),
            },
            repeat_count: self.config.repeat_count,
            warmup_count: self.config.warmup_count,
            base_time_reference: reference_stats.median,
            reference: LanguageReport::from_samples(
                reference.handler.language(),
                &reference.image,
                &reference_samples,
                reference_stats,
            ),
            target: LanguageReport::from_samples(
                target.handler.language(),
                &target.image,
                &target_samples,
                target_stats,
            ),
            adjustment_factor: calibration.factor,
            calibration_status: calibration.status,
            notes,
            schema_version: BENCHMARK_SCHEMA_VERSION,
        };

        if let Err(e) = workspace.release() {
            tracing::warn!("{}", e);
        }

        Ok(record)
    }

    /// Validate the request and look up handlers, images and policies
    fn resolve(&self, request: &BenchmarkRequest) -> AppResult<(Side, Side)> {
        // Checked up front so a finished record is never rejected by storage
        validate_problem_id(&request.problem_id)?;
        if request.reference.language == request.target.language {
            return Err(AppError::InvalidInput(format!(
                "Reference and target must differ, both are '{}'",
                request.reference.language
            )));
        }
        if let Some(cap) = request.factor_cap {
            if !(cap > 0.0) {
                return Err(AppError::InvalidInput(format!(
                    "factor_cap must be positive, got {}",
                    cap
                )));
            }
        }

        Ok((
            self.side(&request.reference.language)?,
            self.side(&request.target.language)?,
        ))
    }

    fn side(&self, language: &str) -> AppResult<Side> {
        let handler = LanguageHandler::for_language(language)?;
        let missing = || AppError::Configuration(format!("No image configured for {}", language));

        Ok(Side {
            image: self.images.image_for(language).ok_or_else(missing)?.to_string(),
            dockerfile: BuildSpec::new(self.images.dockerfile_for(language).ok_or_else(missing)?),
            policy: self.policies.for_language(language),
            handler,
        })
    }

    fn invocation(&self, side: &Side, command: &str, stdin: Option<Vec<u8>>) -> Invocation {
        Invocation {
            image: side.image.clone(),
            command: command.to_string(),
            stdin,
            limits: side.policy.limits(),
            timeout: self.config.hard_timeout,
        }
    }
}
