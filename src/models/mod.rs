//! Domain models
//!
//! Value types produced and consumed by a benchmark run.

pub mod benchmark;
pub mod policy;

pub use benchmark::*;
pub use policy::*;
