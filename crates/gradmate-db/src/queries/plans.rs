//! Database query functions for the `study_plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{StudyPlan, TaskEntry};

/// Insert a new plan document. Returns the row with server-generated
/// defaults (id, created_on, version).
pub async fn insert_plan(
    pool: &PgPool,
    owner_id: &str,
    title: &str,
    tasks: &[TaskEntry],
) -> Result<StudyPlan> {
    let plan = sqlx::query_as::<_, StudyPlan>(
        "INSERT INTO study_plans (owner_id, title, tasks) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(owner_id)
    .bind(title)
    .bind(Json(tasks))
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert study plan for owner {owner_id}"))?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<StudyPlan>> {
    let plan = sqlx::query_as::<_, StudyPlan>("SELECT * FROM study_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch study plan {id}"))?;

    Ok(plan)
}

/// List every plan owned by `owner_id`, oldest first so the first row is the
/// canonical plan.
pub async fn list_plans_for_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<StudyPlan>> {
    let plans = sqlx::query_as::<_, StudyPlan>(
        "SELECT * FROM study_plans \
         WHERE owner_id = $1 \
         ORDER BY created_on ASC, id ASC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list study plans for owner {owner_id}"))?;

    Ok(plans)
}

/// Rewrite a plan's title and task list if its stored version still equals
/// `plan.version`.
///
/// Returns the updated row (with the bumped version), or `None` when the plan
/// is gone or another writer got there first.
pub async fn replace_plan(pool: &PgPool, plan: &StudyPlan) -> Result<Option<StudyPlan>> {
    let updated = sqlx::query_as::<_, StudyPlan>(
        "UPDATE study_plans \
         SET title = $1, tasks = $2, version = version + 1 \
         WHERE id = $3 AND version = $4 \
         RETURNING *",
    )
    .bind(&plan.title)
    .bind(Json(&plan.tasks))
    .bind(plan.id)
    .bind(plan.version)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to replace study plan {}", plan.id))?;

    Ok(updated)
}
