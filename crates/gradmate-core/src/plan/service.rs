//! The study plan task manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gradmate_db::models::{StudyPlan, TaskEntry};

use crate::due::{normalize_due_date, sort_by_due_date};
use crate::error::StudyPlanError;
use crate::generator::{ResponseFormat, TextGenerator, generate_with_timeout};
use crate::ident::TaskRef;
use crate::store::{NewPlan, PlanStore, ReplaceOutcome, record_usage_best_effort};

use super::prompt::{
    build_task_prompt, build_title_prompt, clean_title, fallback_title, parse_generated_tasks,
};
use super::types::{GenerationOutcome, PlanSummary, TaskPatch, TaskView};

/// Usage-audit feature name for task generation.
pub const GENERATE_FEATURE: &str = "studyplan_generate";

/// Tunables for [`StudyPlanTaskManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Upper bound on every generator call.
    pub ai_timeout: Duration,
    /// A requested plan title equal to this is treated as "no title given".
    pub default_plan_title: String,
    /// Re-read and re-apply attempts after a stale write before giving up.
    pub max_conflict_retries: u32,
    pub default_task_count: usize,
    pub max_task_count: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            ai_timeout: Duration::from_secs(20),
            default_plan_title: "My Study Plan".to_string(),
            max_conflict_retries: 3,
            default_task_count: 5,
            max_task_count: 15,
        }
    }
}

/// Owns the list-of-tasks-within-a-plan model for every user.
///
/// Each write rewrites the whole plan document through
/// [`PlanStore::replace`], which only succeeds against the version that was
/// read. A stale write re-reads the plan and re-applies the change.
pub struct StudyPlanTaskManager {
    store: Arc<dyn PlanStore>,
    generator: Arc<dyn TextGenerator>,
    config: ManagerConfig,
}

impl StudyPlanTaskManager {
    pub fn new(
        store: Arc<dyn PlanStore>,
        generator: Arc<dyn TextGenerator>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// Every task of every plan the user owns, ordered by due date.
    ///
    /// Tasks without a parseable due date come last; ties keep stored order.
    pub async fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskView>, StudyPlanError> {
        let plans = self
            .store
            .find_by_owner(user_id)
            .await
            .map_err(StudyPlanError::upstream)?;

        let mut tasks: Vec<TaskView> = plans
            .iter()
            .flat_map(|plan| {
                plan.tasks
                    .iter()
                    .map(|entry| TaskView::from_entry(plan.id, entry))
            })
            .collect();
        sort_by_due_date(&mut tasks, |t| t.due_date.as_deref());
        Ok(tasks)
    }

    /// Append a pending task to the user's plan, creating the plan if needed.
    pub async fn create_task(
        &self,
        user_id: &str,
        plan_title: Option<&str>,
        task_title: &str,
        due_date: Option<&str>,
    ) -> Result<TaskView, StudyPlanError> {
        if task_title.trim().is_empty() {
            return Err(StudyPlanError::InvalidInput(
                "task title must not be empty".to_string(),
            ));
        }
        let entry = TaskEntry::pending(task_title, normalize_due_date(due_date));
        let plan_id = self
            .append_tasks(user_id, vec![entry.clone()], plan_title, task_title)
            .await?;
        Ok(TaskView::from_entry(plan_id, &entry))
    }

    /// Merge `patch` onto the first task titled like the id's title.
    ///
    /// A title that matches nothing is not an error; the plan is left alone.
    pub async fn update_task(
        &self,
        user_id: &str,
        composite_id: &str,
        patch: &TaskPatch,
    ) -> Result<(), StudyPlanError> {
        let task_ref: TaskRef = composite_id.parse()?;
        patch.validate()?;
        self.mutate_plan(user_id, &task_ref, |tasks| {
            match tasks.iter_mut().find(|t| t.task == task_ref.title) {
                Some(entry) => {
                    patch.apply_to(entry);
                    true
                }
                None => false,
            }
        })
        .await
    }

    /// Remove every task titled like the id's title. Idempotent.
    pub async fn delete_task(&self, user_id: &str, composite_id: &str) -> Result<(), StudyPlanError> {
        let task_ref: TaskRef = composite_id.parse()?;
        self.mutate_plan(user_id, &task_ref, |tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.task != task_ref.title);
            tasks.len() != before
        })
        .await
    }

    /// Ask the generator for tasks matching `request` and append them all to
    /// the user's plan in one write.
    pub async fn generate_tasks_from_request(
        &self,
        user_id: &str,
        request: &str,
        count: Option<usize>,
        title_override: Option<&str>,
    ) -> Result<GenerationOutcome, StudyPlanError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(StudyPlanError::InvalidInput(
                "request must not be empty".to_string(),
            ));
        }
        let count = count
            .unwrap_or(self.config.default_task_count)
            .clamp(1, self.config.max_task_count.max(1));

        let prompt = build_task_prompt(request, count, Utc::now().date_naive());
        debug!(user_id, count, "requesting study tasks");
        let raw = generate_with_timeout(
            self.generator.as_ref(),
            &prompt,
            ResponseFormat::Json,
            self.config.ai_timeout,
        )
        .await
        .map_err(StudyPlanError::upstream)?;

        record_usage_best_effort(self.store.as_ref(), user_id, GENERATE_FEATURE, request, &raw)
            .await;

        let entries = parse_generated_tasks(&raw)?;
        let tasks_added = entries.len();
        let plan_id = self
            .append_tasks(user_id, entries, title_override, request)
            .await?;
        info!(user_id, %plan_id, tasks_added, "added generated tasks");
        Ok(GenerationOutcome {
            plan_id,
            tasks_added,
        })
    }

    /// Overview of the user's plans, oldest first.
    pub async fn list_plans(&self, user_id: &str) -> Result<Vec<PlanSummary>, StudyPlanError> {
        let plans = self
            .store
            .find_by_owner(user_id)
            .await
            .map_err(StudyPlanError::upstream)?;
        Ok(plans.iter().map(PlanSummary::from).collect())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Append `entries` to the user's first plan, or create one holding them.
    async fn append_tasks(
        &self,
        user_id: &str,
        entries: Vec<TaskEntry>,
        requested_title: Option<&str>,
        title_seed: &str,
    ) -> Result<Uuid, StudyPlanError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let existing = self
                .store
                .find_by_owner(user_id)
                .await
                .map_err(StudyPlanError::upstream)?
                .into_iter()
                .next();

            let Some(mut plan) = existing else {
                let title = self.resolve_plan_title(requested_title, title_seed).await;
                let plan = self
                    .store
                    .insert(NewPlan {
                        owner_id: user_id.to_owned(),
                        title,
                        tasks: entries,
                    })
                    .await
                    .map_err(StudyPlanError::upstream)?;
                info!(user_id, plan_id = %plan.id, title = %plan.title, "created study plan");
                return Ok(plan.id);
            };

            plan.tasks.extend(entries.iter().cloned());
            if let Some(plan_id) = self.try_replace(&plan, attempt).await? {
                return Ok(plan_id);
            }
        }
    }

    /// Load, authorize and mutate one plan. `mutate` returns whether it
    /// changed anything; unchanged plans are not written.
    async fn mutate_plan<F>(
        &self,
        user_id: &str,
        task_ref: &TaskRef,
        mutate: F,
    ) -> Result<(), StudyPlanError>
    where
        F: Fn(&mut Vec<TaskEntry>) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut plan = self
                .store
                .get(task_ref.plan_id)
                .await
                .map_err(StudyPlanError::upstream)?
                .ok_or(StudyPlanError::NotFound(task_ref.plan_id))?;
            if plan.owner_id != user_id {
                return Err(StudyPlanError::Unauthorized {
                    plan_id: plan.id,
                    user_id: user_id.to_owned(),
                });
            }

            if !mutate(&mut plan.tasks) {
                debug!(plan_id = %plan.id, title = %task_ref.title, "no task matched; nothing to write");
                return Ok(());
            }
            if self.try_replace(&plan, attempt).await?.is_some() {
                return Ok(());
            }
        }
    }

    /// Compare-and-swap `plan`. `None` means another writer got there first
    /// and the caller should re-read; past the retry budget that is a
    /// [`StudyPlanError::Conflict`].
    async fn try_replace(
        &self,
        plan: &StudyPlan,
        attempt: u32,
    ) -> Result<Option<Uuid>, StudyPlanError> {
        match self
            .store
            .replace(plan)
            .await
            .map_err(StudyPlanError::upstream)?
        {
            ReplaceOutcome::Written(stored) => {
                debug!(plan_id = %stored.id, version = stored.version, "plan written");
                Ok(Some(stored.id))
            }
            ReplaceOutcome::Stale if attempt > self.config.max_conflict_retries => {
                Err(StudyPlanError::Conflict {
                    plan_id: plan.id,
                    attempts: attempt,
                })
            }
            ReplaceOutcome::Stale => {
                warn!(plan_id = %plan.id, attempt, "plan changed concurrently; retrying");
                Ok(None)
            }
        }
    }

    /// Caller title, else a generated one, else the deterministic fallback.
    async fn resolve_plan_title(&self, requested: Option<&str>, seed: &str) -> String {
        if let Some(title) = requested
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != self.config.default_plan_title)
        {
            return title.to_owned();
        }

        match generate_with_timeout(
            self.generator.as_ref(),
            &build_title_prompt(seed),
            ResponseFormat::Text,
            self.config.ai_timeout,
        )
        .await
        {
            Ok(text) => clean_title(&text).unwrap_or_else(|| {
                warn!(response = %text, "unusable AI plan title; using fallback");
                fallback_title(seed)
            }),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "AI plan title failed; using fallback");
                fallback_title(seed)
            }
        }
    }
}
