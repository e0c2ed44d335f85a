//! Benchmark repositories
//!
//! Repositories handle all direct storage interactions.

pub mod benchmark_repo;

pub use benchmark_repo::{ActiveBenchmark, BenchmarkRepository, JsonFileRepository, StoredBenchmark};
