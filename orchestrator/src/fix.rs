//! Injectable fix generation.
//!
//! Understanding and rewriting code is outside the orchestrator. The
//! implementation phase asks a [`FixGenerator`] for the new content of each
//! planned file and only sequences the surrounding tool calls.

use anyhow::Result;
use async_trait::async_trait;

use crate::core::trace::Analysis;
use crate::core::types::ProblemInstance;

/// Input handed to a fix generator for one file.
#[derive(Debug, Clone, Copy)]
pub struct FixRequest<'a> {
    pub instance: &'a ProblemInstance,
    pub analysis: &'a Analysis,
    pub path: &'a str,
    pub content: &'a str,
}

#[async_trait]
pub trait FixGenerator: Send + Sync {
    /// Return the proposed content of `request.path`.
    ///
    /// Returning the input unchanged means "no edit".
    async fn generate(&self, request: FixRequest<'_>) -> Result<String>;
}

/// Generator that never proposes a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnchangedFix;

#[async_trait]
impl FixGenerator for UnchangedFix {
    async fn generate(&self, request: FixRequest<'_>) -> Result<String> {
        Ok(request.content.to_string())
    }
}
