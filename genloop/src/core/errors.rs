//! Typed failures that abort a workflow.
//!
//! Everything else is reported through `anyhow` context; these variants exist
//! so the CLI can tell an operator-fixable precondition from a runtime fault.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// A required input or derived artifact is absent.
    #[error("missing {store} artifact '{key}'")]
    MissingArtifact { store: String, key: String },
    /// A step replays another step's conversation, which was never recorded.
    #[error("step '{step}' has no recorded conversation (run a workflow that includes it first)")]
    MissingLog { step: String },
}
