//! Benchmark execution engine
//!
//! Measures a reference-language and a target-language solution of the same
//! problem under identical sandbox conditions and derives the factor that
//! scales a reference time limit to the target language.
//!
//! - **Workspace** (`workspace.rs`): scratch directory with sources and input
//! - **Container** (`container.rs`): sandbox runtime seam and Docker backend
//! - **Executor** (`executor.rs`): timed invocations and outcome classification
//! - **Sampler** (`sampler.rs`): warm-up plus measured repeats
//! - **Metrics** (`metrics.rs`): median, percentiles, IQR and stability
//! - **Calibration** (`calibration.rs`): factor policy, including censored data
//! - **Images** (`images.rs`): build-on-demand image provisioning

pub mod calibration;
pub mod container;
pub mod executor;
pub mod images;
pub mod languages;
pub mod metrics;
pub mod runner;
pub mod sampler;
pub mod workspace;

pub use container::{DockerRuntime, SandboxRuntime};
pub use executor::SandboxExecutor;
pub use images::ImageProvisioner;
pub use runner::{BenchmarkRequest, BenchmarkRunner, LanguageSubmission};
pub use sampler::RepeatedSampler;
pub use workspace::Workspace;
