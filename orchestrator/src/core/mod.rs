//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod chains;
pub mod classifier;
pub mod complexity;
pub mod condition;
pub mod params;
pub mod results;
pub mod retry;
pub mod trace;
pub mod types;
pub mod workflow;
