//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! Configuration is loaded once by the binary and passed explicitly to the
//! components that need it, so concurrent runs can use distinct settings.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    container_images, dockerfiles, languages, DEFAULT_DOCKER_BINARY, DEFAULT_DOCKER_SOCKET,
    DEFAULT_HARD_TIMEOUT_SECONDS, DEFAULT_OUTPUT_DIR, DEFAULT_REPEAT_COUNT, DEFAULT_WARMUP_COUNT,
};
use crate::models::PolicyTable;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub log: LogConfig,
    pub docker: DockerConfig,
    pub images: ImageConfig,
    pub benchmark: BenchmarkConfig,
    pub storage: StorageConfig,
    pub policies: PolicyTable,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub rust_log: String,
    pub json: bool,
}

/// Docker daemon configuration
#[derive(Debug, Clone)]
pub struct DockerConfig {
    pub socket_path: String,
    /// CLI used for image builds
    pub binary: String,
}

/// Image tags and the Dockerfiles they are built from
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub cpp: String,
    pub python: String,
    pub cpp_dockerfile: PathBuf,
    pub python_dockerfile: PathBuf,
}

impl ImageConfig {
    /// Image tag for a language
    pub fn image_for(&self, language: &str) -> Option<&str> {
        match language {
            languages::CPP => Some(&self.cpp),
            languages::PYTHON => Some(&self.python),
            _ => None,
        }
    }

    /// Dockerfile for a language
    pub fn dockerfile_for(&self, language: &str) -> Option<&PathBuf> {
        match language {
            languages::CPP => Some(&self.cpp_dockerfile),
            languages::PYTHON => Some(&self.python_dockerfile),
            _ => None,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            cpp: container_images::CPP.to_string(),
            python: container_images::PYTHON.to_string(),
            cpp_dockerfile: PathBuf::from(dockerfiles::CPP),
            python_dockerfile: PathBuf::from(dockerfiles::PYTHON),
        }
    }
}

/// Where the wall clock starts for each measured invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockStart {
    /// Before the container is created; includes cold start in every sample
    #[default]
    BeforeCreate,
    /// After the container has started; excludes container setup
    AfterStart,
}

impl FromStr for ClockStart {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before_create" => Ok(Self::BeforeCreate),
            "after_start" => Ok(Self::AfterStart),
            _ => Err(ConfigError::InvalidValue("BENCHMARK_CLOCK_START".to_string())),
        }
    }
}

/// Benchmark execution configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Measured invocations per language
    pub repeat_count: u32,
    /// Discarded invocations before measurement
    pub warmup_count: u32,
    /// Hard timeout for every sandboxed invocation, compilation included
    pub hard_timeout: Duration,
    pub clock_start: ClockStart,
    /// Parent directory for scratch workspaces
    pub workspace_root: PathBuf,
    /// Leave workspaces on disk after the run for inspection
    pub keep_workspace: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            repeat_count: DEFAULT_REPEAT_COUNT,
            warmup_count: DEFAULT_WARMUP_COUNT,
            hard_timeout: Duration::from_secs(DEFAULT_HARD_TIMEOUT_SECONDS),
            clock_start: ClockStart::default(),
            workspace_root: env::temp_dir(),
            keep_workspace: false,
        }
    }
}

/// Benchmark record storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            log: LogConfig::from_env()?,
            docker: DockerConfig::from_env()?,
            images: ImageConfig::from_env()?,
            benchmark: BenchmarkConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            policies: load_policies()?,
        })
    }
}

impl LogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

impl DockerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            socket_path: env::var("DOCKER_SOCKET")
                .unwrap_or_else(|_| DEFAULT_DOCKER_SOCKET.to_string()),
            binary: env::var("DOCKER_BINARY")
                .unwrap_or_else(|_| DEFAULT_DOCKER_BINARY.to_string()),
        })
    }
}

impl ImageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            cpp: env::var("CPP_IMAGE").unwrap_or(defaults.cpp),
            python: env::var("PYTHON_IMAGE").unwrap_or(defaults.python),
            cpp_dockerfile: env::var("CPP_DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.cpp_dockerfile),
            python_dockerfile: env::var("PYTHON_DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.python_dockerfile),
        })
    }
}

impl BenchmarkConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let repeat_count: u32 = parse_var("BENCHMARK_REPEATS", DEFAULT_REPEAT_COUNT)?;
        if repeat_count == 0 {
            return Err(ConfigError::InvalidValue("BENCHMARK_REPEATS".to_string()));
        }

        Ok(Self {
            repeat_count,
            warmup_count: parse_var("BENCHMARK_WARMUPS", DEFAULT_WARMUP_COUNT)?,
            hard_timeout: Duration::from_secs(parse_var(
                "BENCHMARK_HARD_TIMEOUT_SECONDS",
                DEFAULT_HARD_TIMEOUT_SECONDS,
            )?),
            clock_start: match env::var("BENCHMARK_CLOCK_START") {
                Ok(value) => value.parse()?,
                Err(_) => ClockStart::default(),
            },
            workspace_root: env::var("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            keep_workspace: parse_var("KEEP_WORKSPACE", false)?,
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: PathBuf::from(
                env::var("BENCHMARK_OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            ),
        })
    }
}

/// Read an optional JSON policy file, falling back to built-in defaults
fn load_policies() -> Result<PolicyTable, ConfigError> {
    let Ok(path) = env::var("LANGUAGE_POLICY_FILE") else {
        return Ok(PolicyTable::default());
    };

    let raw = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::InvalidValue("LANGUAGE_POLICY_FILE".to_string()))?;
    let table: PolicyTable = serde_json::from_str(&raw)
        .map_err(|_| ConfigError::InvalidValue("LANGUAGE_POLICY_FILE".to_string()))?;
    table.validate().map_err(ConfigError::InvalidPolicy)?;

    Ok(table)
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error("Invalid language policy: {0}")]
    InvalidPolicy(String),
}
