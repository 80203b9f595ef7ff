//! Workflow orchestration for software-repair tasks.
//!
//! An instance is classified, routed to a strategy, and executed as a series
//! of calls to an external tool service. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, scoring, chain
//!   templates, parameter completion, conditions, trace records).
//! - **[`io`]**: Side effects (tool transport, config and instance files, patch
//!   rendering). Isolated behind traits so tests can script the tool service.
//!
//! Orchestration modules ([`executor`], [`engine`], [`phases`], [`strategy`],
//! [`solve`]) combine the two to run workflows.

pub mod core;
pub mod engine;
pub mod executor;
pub mod exit_codes;
pub mod fix;
pub mod io;
pub mod logging;
pub mod phases;
pub mod solve;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validation;
