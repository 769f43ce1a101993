//! [`PlanStore`] over the `gradmate-db` query layer.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use gradmate_db::models::StudyPlan;
use gradmate_db::queries::usage_logs::{self, NewUsageRecord};
use gradmate_db::queries::plans as plan_queries;

use super::{NewPlan, PlanStore, ReplaceOutcome};

#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StudyPlan>> {
        plan_queries::list_plans_for_owner(&self.pool, owner_id).await
    }

    async fn get(&self, plan_id: Uuid) -> Result<Option<StudyPlan>> {
        plan_queries::get_plan(&self.pool, plan_id).await
    }

    async fn insert(&self, plan: NewPlan) -> Result<StudyPlan> {
        plan_queries::insert_plan(&self.pool, &plan.owner_id, &plan.title, &plan.tasks).await
    }

    async fn replace(&self, plan: &StudyPlan) -> Result<ReplaceOutcome> {
        Ok(match plan_queries::replace_plan(&self.pool, plan).await? {
            Some(stored) => ReplaceOutcome::Written(stored),
            None => ReplaceOutcome::Stale,
        })
    }

    async fn record_usage(&self, record: &NewUsageRecord) -> Result<()> {
        usage_logs::insert_usage_record(&self.pool, record).await?;
        Ok(())
    }
}
