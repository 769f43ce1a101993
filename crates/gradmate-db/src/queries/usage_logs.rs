//! Database query functions for the `usage_logs` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::UsageRecord;

/// Parameters for inserting a usage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUsageRecord {
    pub owner_id: String,
    pub feature: String,
    pub request: String,
    pub response: String,
}

/// Insert a usage row. Returns it with server-generated defaults.
pub async fn insert_usage_record(pool: &PgPool, new: &NewUsageRecord) -> Result<UsageRecord> {
    let record = sqlx::query_as::<_, UsageRecord>(
        "INSERT INTO usage_logs (owner_id, feature, request, response) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(&new.owner_id)
    .bind(&new.feature)
    .bind(&new.request)
    .bind(&new.response)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert usage record for owner {} feature {}",
            new.owner_id, new.feature
        )
    })?;

    Ok(record)
}

/// Most recent usage rows for an owner, newest first.
pub async fn list_usage_for_owner(
    pool: &PgPool,
    owner_id: &str,
    limit: i64,
) -> Result<Vec<UsageRecord>> {
    let records = sqlx::query_as::<_, UsageRecord>(
        "SELECT * FROM usage_logs \
         WHERE owner_id = $1 \
         ORDER BY created_on DESC \
         LIMIT $2",
    )
    .bind(owner_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list usage records for owner {owner_id}"))?;

    Ok(records)
}
