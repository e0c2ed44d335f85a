//! AdaptiveJudge - Per-language time limit calibration
//!
//! Runs a fast reference solution and a target-language solution of the same
//! problem under identical sandbox conditions, then derives the factor by
//! which the target's time limit should be scaled.
//!
//! # Architecture
//!
//! - **Benchmark**: workspace, sandbox execution, sampling, statistics, calibration
//! - **Services**: run a calibration and persist its record
//! - **Repositories**: benchmark record storage
//! - **Models**: records, statistics and language policies

pub mod benchmark;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
