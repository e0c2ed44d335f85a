//! Repeated sampling of one language's program

use std::path::Path;

use crate::models::SampleSet;

use super::executor::{Invocation, SandboxExecutor};

/// Drives warm-up invocations followed by measured invocations
#[derive(Debug, Clone, Copy)]
pub struct RepeatedSampler {
    pub warmup_count: u32,
    pub repeat_count: u32,
}

impl RepeatedSampler {
    pub fn new(warmup_count: u32, repeat_count: u32) -> Self {
        Self {
            warmup_count,
            repeat_count,
        }
    }

    /// Run the program sequentially and collect the measured outcomes.
    ///
    /// Warm-up outcomes are dropped without inspection. Every measured
    /// outcome is recorded, failures included, so the set always holds
    /// `repeat_count` outcomes.
    pub async fn sample(
        &self,
        executor: &SandboxExecutor,
        workspace: &Path,
        invocation: &Invocation,
    ) -> SampleSet {
        for _ in 0..self.warmup_count {
            let _ = executor.execute(workspace, invocation).await;
        }

        let mut samples = SampleSet::new();
        for iteration in 0..self.repeat_count {
            let outcome = executor.execute(workspace, invocation).await;

            tracing::debug!(
                image = %invocation.image,
                iteration,
                kind = %outcome.kind(),
                elapsed_s = outcome.elapsed().map(|d| d.as_secs_f64()),
                "Measured sample"
            );

            samples.push(outcome);
        }

        samples
    }
}
