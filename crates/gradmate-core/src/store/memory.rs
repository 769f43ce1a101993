//! In-process [`PlanStore`] backed by a mutex-guarded vector.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use gradmate_db::models::{StudyPlan, UsageRecord};
use gradmate_db::queries::usage_logs::NewUsageRecord;

use super::{NewPlan, PlanStore, ReplaceOutcome};

#[derive(Debug, Default)]
struct State {
    /// Insertion order doubles as creation order.
    plans: Vec<StudyPlan>,
    usage: Vec<UsageRecord>,
}

/// Volatile plan store. Data lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    state: Mutex<State>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored plan.
    pub async fn plans(&self) -> Vec<StudyPlan> {
        self.state.lock().await.plans.clone()
    }

    /// Snapshot of every usage record, oldest first.
    pub async fn usage_records(&self) -> Vec<UsageRecord> {
        self.state.lock().await.usage.clone()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StudyPlan>> {
        let state = self.state.lock().await;
        Ok(state
            .plans
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get(&self, plan_id: Uuid) -> Result<Option<StudyPlan>> {
        let state = self.state.lock().await;
        Ok(state.plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn insert(&self, plan: NewPlan) -> Result<StudyPlan> {
        let stored = StudyPlan {
            id: Uuid::new_v4(),
            owner_id: plan.owner_id,
            title: plan.title,
            created_on: Utc::now(),
            tasks: plan.tasks,
            version: 0,
        };
        debug!(plan_id = %stored.id, owner_id = %stored.owner_id, "inserted plan");
        self.state.lock().await.plans.push(stored.clone());
        Ok(stored)
    }

    async fn replace(&self, plan: &StudyPlan) -> Result<ReplaceOutcome> {
        let mut state = self.state.lock().await;
        let Some(current) = state.plans.iter_mut().find(|p| p.id == plan.id) else {
            return Ok(ReplaceOutcome::Stale);
        };
        if current.version != plan.version {
            return Ok(ReplaceOutcome::Stale);
        }
        current.title = plan.title.clone();
        current.tasks = plan.tasks.clone();
        current.version += 1;
        Ok(ReplaceOutcome::Written(current.clone()))
    }

    async fn record_usage(&self, record: &NewUsageRecord) -> Result<()> {
        self.state.lock().await.usage.push(UsageRecord {
            id: Uuid::new_v4(),
            owner_id: record.owner_id.clone(),
            feature: record.feature.clone(),
            request: record.request.clone(),
            response: record.response.clone(),
            created_on: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gradmate_db::models::TaskEntry;

    use super::*;

    fn new_plan(owner: &str) -> NewPlan {
        NewPlan {
            owner_id: owner.to_string(),
            title: "plan".to_string(),
            tasks: vec![TaskEntry::pending("Read Ch1", None)],
        }
    }

    #[tokio::test]
    async fn find_by_owner_filters_and_keeps_order() {
        let store = MemoryPlanStore::new();
        let a1 = store.insert(new_plan("alice")).await.unwrap();
        store.insert(new_plan("bob")).await.unwrap();
        let a2 = store.insert(new_plan("alice")).await.unwrap();

        let ids: Vec<Uuid> = store
            .find_by_owner("alice")
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![a1.id, a2.id]);
    }

    #[tokio::test]
    async fn replace_is_compare_and_swap() {
        let store = MemoryPlanStore::new();
        let plan = store.insert(new_plan("alice")).await.unwrap();

        let mut first = plan.clone();
        first.title = "renamed".to_string();
        let ReplaceOutcome::Written(stored) = store.replace(&first).await.unwrap() else {
            panic!("first replace should be written");
        };
        assert_eq!(stored.version, 1);

        // Still carrying version 0.
        let mut stale = plan.clone();
        stale.title = "lost".to_string();
        assert_eq!(store.replace(&stale).await.unwrap(), ReplaceOutcome::Stale);

        let current = store.get(plan.id).await.unwrap().unwrap();
        assert_eq!(current.title, "renamed");
    }

    #[tokio::test]
    async fn replace_of_unknown_plan_is_stale() {
        let store = MemoryPlanStore::new();
        let plan = store.insert(new_plan("alice")).await.unwrap();
        let mut ghost = plan;
        ghost.id = Uuid::new_v4();
        assert_eq!(store.replace(&ghost).await.unwrap(), ReplaceOutcome::Stale);
    }
}
