use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of an embedded study task.
///
/// Task documents are loosely typed, so any status string round-trips: the
/// well-known values get their own variants and everything else is kept in
/// [`TaskStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Completed,
    Other(String),
}

impl TaskStatus {
    /// `done` and `completed` both count as finished.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done | Self::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "pending" => Self::Pending,
            "in_progress" | "in-progress" => Self::InProgress,
            "done" => Self::Done,
            "completed" => Self::Completed,
            _ => Self::Other(s.to_owned()),
        })
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A task embedded in a study plan's `tasks` array.
///
/// There is no task id: `task` (the title) is the lookup key within a plan.
/// Fields this struct does not know about are preserved in `extra`.
/// A `null` or non-string `due_date` reads as absent and a `null` or
/// non-string `status` reads as pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task: String,
    #[serde(default, deserialize_with = "lenient_due_date")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: TaskStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskEntry {
    /// A fresh pending task.
    pub fn pending(task: impl Into<String>, due_date: Option<String>) -> Self {
        Self {
            task: task.into(),
            due_date,
            status: TaskStatus::Pending,
            extra: Map::new(),
        }
    }
}

fn lenient_due_date<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_status<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => TaskStatus::from(s),
        _ => TaskStatus::Pending,
    })
}

/// A study plan document: one per user in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudyPlan {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub created_on: DateTime<Utc>,
    #[sqlx(json)]
    pub tasks: Vec<TaskEntry>,
    /// Bumped on every successful replace; writers compare-and-swap on it.
    pub version: i64,
}

/// One audited AI request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub feature: String,
    pub request: String,
    pub response: String,
    pub created_on: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_known_values() {
        for (raw, expected) in [
            ("pending", TaskStatus::Pending),
            ("in_progress", TaskStatus::InProgress),
            ("done", TaskStatus::Done),
            ("completed", TaskStatus::Completed),
            ("Done", TaskStatus::Done),
        ] {
            let parsed: TaskStatus = raw.parse().unwrap();
            assert_eq!(parsed, expected, "parsing {raw:?}");
        }
    }

    #[test]
    fn task_status_keeps_unknown_strings() {
        let parsed: TaskStatus = "blocked".parse().unwrap();
        assert_eq!(parsed, TaskStatus::Other("blocked".to_string()));
        assert_eq!(parsed.to_string(), "blocked");
        assert!(!parsed.is_complete());
    }

    #[test]
    fn completion_covers_done_and_completed() {
        assert!(TaskStatus::Done.is_complete());
        assert!(TaskStatus::Completed.is_complete());
        assert!(!TaskStatus::Pending.is_complete());
        assert!(!TaskStatus::InProgress.is_complete());
    }

    #[test]
    fn task_entry_defaults_missing_fields() {
        let entry: TaskEntry = serde_json::from_str(r#"{"task": "Read Ch1"}"#).unwrap();
        assert_eq!(entry.task, "Read Ch1");
        assert_eq!(entry.due_date, None);
        assert_eq!(entry.status, TaskStatus::Pending);
        assert!(entry.extra.is_empty());
    }

    #[test]
    fn task_entry_reads_null_and_odd_typed_fields_as_absent() {
        let entry: TaskEntry =
            serde_json::from_str(r#"{"task": "Read Ch1", "due_date": null, "status": null}"#)
                .unwrap();
        assert_eq!(entry.due_date, None);
        assert_eq!(entry.status, TaskStatus::Pending);

        let entry: TaskEntry =
            serde_json::from_str(r#"{"task": "Read Ch1", "due_date": 20250102, "status": 3}"#)
                .unwrap();
        assert_eq!(entry.due_date, None);
        assert_eq!(entry.status, TaskStatus::Pending);
        assert!(entry.extra.is_empty());
    }

    #[test]
    fn task_entry_preserves_extra_fields() {
        let raw = r#"{"task": "Mock interview", "status": "done", "notes": "bring CV", "priority": 2}"#;
        let entry: TaskEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.status, TaskStatus::Done);
        assert_eq!(entry.extra["notes"], "bring CV");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["priority"], 2);
        assert_eq!(back["status"], "done");
    }
}
