//! Application-wide constants
//!
//! Defaults used when the environment does not override them. Constants are
//! grouped by their purpose for better organization.

// =============================================================================
// BENCHMARK DEFAULTS
// =============================================================================

/// Default number of measured invocations per language
pub const DEFAULT_REPEAT_COUNT: u32 = 5;

/// Default number of discarded warm-up invocations per language
pub const DEFAULT_WARMUP_COUNT: u32 = 1;

/// Default hard timeout per sandboxed invocation, in seconds
pub const DEFAULT_HARD_TIMEOUT_SECONDS: u64 = 60;

/// Schema version stamped on every benchmark record
pub const BENCHMARK_SCHEMA_VERSION: u32 = 1;

/// Maximum number of stderr bytes retained per outcome
pub const MAX_STDERR_BYTES: usize = 4096;

/// Exit status used by coreutils `timeout(1)` when the command timed out
pub const TIMEOUT_EXIT_CODE: i64 = 124;

/// Prefix for per-run scratch directories
pub const WORKSPACE_PREFIX: &str = "acj_bench_";

/// Default directory for persisted benchmark records
pub const DEFAULT_OUTPUT_DIR: &str = "benchmarks";

// =============================================================================
// LANGUAGE POLICY DEFAULTS
// =============================================================================

/// Lowest acceptable adjustment factor
pub const DEFAULT_FACTOR_FLOOR: f64 = 1.0;

/// Highest acceptable adjustment factor, also injected for censored targets
pub const DEFAULT_FACTOR_CAP: f64 = 12.0;

/// CPU limit per container (number of cores)
pub const DEFAULT_CPU_LIMIT: f64 = 1.0;

/// Memory limit per container in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 1024;

/// Maximum IQR as a fraction of the median for a stable measurement
pub const DEFAULT_STABILITY_THRESHOLD: f64 = 0.05;

/// Maximum number of processes inside a sandbox container
pub const CONTAINER_PIDS_LIMIT: i64 = 64;

// =============================================================================
// DOCKER
// =============================================================================

/// Default Docker daemon socket
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Default Docker CLI binary, used for image builds
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Docker API request timeout in seconds
pub const DOCKER_API_TIMEOUT_SECONDS: u64 = 120;

/// Mount point of the workspace inside every sandbox container
pub const CONTAINER_WORKDIR: &str = "/work";

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const CPP: &str = "cpp";
    pub const PYTHON: &str = "python";

    /// All supported language identifiers
    pub const ALL: &[&str] = &[CPP, PYTHON];
}

/// Container images for each language
pub mod container_images {
    pub const CPP: &str = "adaptivejudge-cpp:latest";
    pub const PYTHON: &str = "adaptivejudge-python:latest";
}

/// Dockerfiles the images are built from when absent
pub mod dockerfiles {
    pub const CPP: &str = "docker/Dockerfile.cpp";
    pub const PYTHON: &str = "docker/Dockerfile.python";
}

/// Workspace file names
pub mod files {
    pub const INPUT: &str = "input.txt";
}
