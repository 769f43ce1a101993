//! Error taxonomy for study plan operations.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by [`crate::plan::StudyPlanTaskManager`].
///
/// Collaborator failures (store, text generator) arrive as `anyhow::Error`
/// and are wrapped in [`StudyPlanError::UpstreamUnavailable`].
#[derive(Debug, Error)]
pub enum StudyPlanError {
    #[error("study plan {0} not found")]
    NotFound(Uuid),

    #[error("study plan {plan_id} does not belong to user {user_id:?}")]
    Unauthorized { plan_id: Uuid, user_id: String },

    #[error("invalid task identifier {0:?} (expected <plan-id>:<task title>)")]
    InvalidIdentifier(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("AI response invalid: {0}")]
    AiResponseInvalid(String),

    #[error("upstream unavailable: {0:#}")]
    UpstreamUnavailable(#[source] anyhow::Error),

    #[error("study plan {plan_id} changed concurrently; gave up after {attempts} attempts")]
    Conflict { plan_id: Uuid, attempts: u32 },
}

impl StudyPlanError {
    pub(crate) fn upstream(err: anyhow::Error) -> Self {
        Self::UpstreamUnavailable(err)
    }
}
