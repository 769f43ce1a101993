//! Document store interface for study plans.
//!
//! The task manager only needs equality lookup by owner, get-by-id, insert,
//! and a whole-document replace guarded by the plan's `version`. Two
//! implementations ship: [`PgPlanStore`] for production and
//! [`MemoryPlanStore`] for tests and database-less runs.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use gradmate_db::models::{StudyPlan, TaskEntry};
use gradmate_db::queries::usage_logs::NewUsageRecord;

pub use memory::MemoryPlanStore;
pub use postgres::PgPlanStore;

/// Longest request/response excerpt kept in a usage record.
pub const USAGE_EXCERPT_CHARS: usize = 500;

/// A plan document that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub owner_id: String,
    pub title: String,
    pub tasks: Vec<TaskEntry>,
}

/// Result of a compare-and-swap replace.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOutcome {
    /// The document was written; carries the stored copy with its new version.
    Written(StudyPlan),
    /// The stored version no longer matched (or the plan vanished).
    Stale,
}

/// Collection of study plan documents.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Every plan whose `owner_id` equals `owner_id`, oldest first.
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StudyPlan>>;

    async fn get(&self, plan_id: Uuid) -> Result<Option<StudyPlan>>;

    /// Store a new plan; the store assigns id, creation time and version.
    async fn insert(&self, plan: NewPlan) -> Result<StudyPlan>;

    /// Overwrite title and tasks if the stored version equals `plan.version`.
    async fn replace(&self, plan: &StudyPlan) -> Result<ReplaceOutcome>;

    /// Append an AI usage audit entry.
    async fn record_usage(&self, record: &NewUsageRecord) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}

/// Write a usage audit entry, logging instead of failing.
pub async fn record_usage_best_effort(
    store: &dyn PlanStore,
    owner_id: &str,
    feature: &str,
    request: &str,
    response: &str,
) {
    let record = NewUsageRecord {
        owner_id: owner_id.to_owned(),
        feature: feature.to_owned(),
        request: excerpt(request, USAGE_EXCERPT_CHARS),
        response: excerpt(response, USAGE_EXCERPT_CHARS),
    };
    if let Err(e) = store.record_usage(&record).await {
        warn!(owner_id, feature, error = %format!("{e:#}"), "failed to record AI usage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 4), "héll");
        assert_eq!(excerpt("short", 500), "short");
        assert_eq!(excerpt("", 3), "");
    }
}
