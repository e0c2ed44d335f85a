//! Persistence module
//!
//! The engine hands finished records to a [`BenchmarkRepository`]; storage
//! schema and history belong to the repository implementation.

pub mod repositories;

pub use repositories::{ActiveBenchmark, BenchmarkRepository, JsonFileRepository, StoredBenchmark};
