use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use gradmate_db::models::{StudyPlan, TaskEntry, TaskStatus};

use crate::due::normalize_due_date;
use crate::error::StudyPlanError;
use crate::ident::composite_id;

/// Keys with a fixed meaning that may never ride along in `extra`.
pub(crate) const RESERVED_KEYS: &[&str] = &["task", "title", "due_date", "status", "completed", "id", "plan_id"];

/// A task as returned to callers: the stored entry plus its addressing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    /// `<plan id>:<task title>`.
    pub id: String,
    pub plan_id: Uuid,
    pub task: String,
    pub due_date: Option<String>,
    pub status: TaskStatus,
    pub completed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskView {
    pub fn from_entry(plan_id: Uuid, entry: &TaskEntry) -> Self {
        Self {
            id: composite_id(plan_id, &entry.task),
            plan_id,
            task: entry.task.clone(),
            due_date: entry.due_date.clone(),
            status: entry.status.clone(),
            completed: entry.status.is_complete(),
            extra: entry
                .extra
                .iter()
                .filter(|(key, _)| !is_reserved(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

pub(crate) fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Partial update for one task. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub task: Option<String>,
    /// Accepted as a synonym for `task`; `task` wins when both are set.
    #[serde(default)]
    pub title: Option<String>,
    /// `Some(None)` (an explicit `null`) clears the due date.
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Shorthand for `status`: `true` is `done`, `false` is `pending`.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Any other top-level field, merged into the stored task.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Distinguish a field set to `null` from a missing one.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    fn new_title(&self) -> Option<&str> {
        self.task.as_deref().or(self.title.as_deref())
    }

    /// Reject patches that would leave the task without a title.
    pub fn validate(&self) -> Result<(), StudyPlanError> {
        match self.new_title() {
            Some(title) if title.trim().is_empty() => Err(StudyPlanError::InvalidInput(
                "task title must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Merge this patch onto `entry`.
    pub fn apply_to(&self, entry: &mut TaskEntry) {
        if let Some(title) = self.new_title() {
            entry.task = title.to_owned();
        }
        if let Some(due) = &self.due_date {
            entry.due_date = normalize_due_date(due.as_deref());
        }
        match (&self.status, self.completed) {
            (Some(status), _) => entry.status = status.clone(),
            (None, Some(true)) => entry.status = TaskStatus::Done,
            (None, Some(false)) => entry.status = TaskStatus::Pending,
            (None, None) => {}
        }
        for (key, value) in &self.extra {
            if !is_reserved(key) {
                entry.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

/// One row of a user's plan overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub id: Uuid,
    pub title: String,
    pub created_on: DateTime<Utc>,
    pub task_count: usize,
    pub completed_count: usize,
}

impl From<&StudyPlan> for PlanSummary {
    fn from(plan: &StudyPlan) -> Self {
        Self {
            id: plan.id,
            title: plan.title.clone(),
            created_on: plan.created_on,
            task_count: plan.tasks.len(),
            completed_count: plan.tasks.iter().filter(|t| t.status.is_complete()).count(),
        }
    }
}

/// Result of merging AI-generated tasks into a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub plan_id: Uuid,
    pub tasks_added: usize,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry() -> TaskEntry {
        let mut entry = TaskEntry::pending("Read Ch1", Some("2025-01-02".to_string()));
        entry.extra.insert("notes".to_string(), json!("skim"));
        entry
    }

    fn patch(value: Value) -> TaskPatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn view_carries_composite_id_and_completion() {
        let plan_id = Uuid::new_v4();
        let mut e = entry();
        e.status = TaskStatus::Completed;
        let view = TaskView::from_entry(plan_id, &e);
        assert_eq!(view.id, format!("{plan_id}:Read Ch1"));
        assert!(view.completed);

        let wire = serde_json::to_value(&view).unwrap();
        assert_eq!(wire["status"], "completed");
        assert_eq!(wire["notes"], "skim");
        assert_eq!(wire["plan_id"], plan_id.to_string());
    }

    #[test]
    fn view_ignores_addressing_keys_left_in_extra() {
        let plan_id = Uuid::new_v4();
        let mut e = entry();
        e.extra.insert("id".to_string(), json!(1));
        e.extra.insert("completed".to_string(), json!(true));
        let view = TaskView::from_entry(plan_id, &e);
        assert!(!view.extra.contains_key("id"));
        assert!(!view.extra.contains_key("completed"));

        let text = serde_json::to_string(&view).unwrap();
        assert_eq!(text.matches("\"id\"").count(), 1);
        let wire: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(wire["id"], format!("{plan_id}:Read Ch1"));
        assert_eq!(wire["completed"], false);
        assert_eq!(wire["notes"], "skim");
    }

    #[test]
    fn patch_merges_fields() {
        let mut e = entry();
        patch(json!({"status": "in_progress", "priority": 1})).apply_to(&mut e);
        assert_eq!(e.task, "Read Ch1");
        assert_eq!(e.status, TaskStatus::InProgress);
        assert_eq!(e.due_date.as_deref(), Some("2025-01-02"));
        assert_eq!(e.extra["notes"], "skim");
        assert_eq!(e.extra["priority"], 1);
    }

    #[test]
    fn null_due_date_clears_and_absent_keeps() {
        let mut e = entry();
        patch(json!({"task": "Read Ch2"})).apply_to(&mut e);
        assert_eq!(e.due_date.as_deref(), Some("2025-01-02"));

        patch(json!({"due_date": null})).apply_to(&mut e);
        assert_eq!(e.due_date, None);

        patch(json!({"due_date": "2025-02-01T08:00:00+01:00"})).apply_to(&mut e);
        assert_eq!(e.due_date.as_deref(), Some("2025-02-01T07:00:00Z"));
    }

    #[test]
    fn completed_flag_maps_to_status_unless_status_given() {
        let mut e = entry();
        patch(json!({"completed": true})).apply_to(&mut e);
        assert_eq!(e.status, TaskStatus::Done);

        patch(json!({"completed": false})).apply_to(&mut e);
        assert_eq!(e.status, TaskStatus::Pending);

        patch(json!({"completed": true, "status": "in_progress"})).apply_to(&mut e);
        assert_eq!(e.status, TaskStatus::InProgress);
    }

    #[test]
    fn title_is_a_synonym_for_task() {
        let mut e = entry();
        patch(json!({"title": "Read Ch3"})).apply_to(&mut e);
        assert_eq!(e.task, "Read Ch3");
    }

    #[test]
    fn addressing_fields_are_not_copied_into_extra() {
        let mut e = entry();
        patch(json!({"id": "x:y", "plan_id": "z", "difficulty": "hard"})).apply_to(&mut e);
        assert!(!e.extra.contains_key("id"));
        assert!(!e.extra.contains_key("plan_id"));
        assert_eq!(e.extra["difficulty"], "hard");
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = patch(json!({"task": "  "})).validate().unwrap_err();
        assert!(matches!(err, StudyPlanError::InvalidInput(_)));
        assert!(patch(json!({"status": "done"})).validate().is_ok());
    }

    #[test]
    fn summary_counts_completed_tasks() {
        let mut done = TaskEntry::pending("b", None);
        done.status = TaskStatus::Done;
        let plan = StudyPlan {
            id: Uuid::new_v4(),
            owner_id: "u1".to_string(),
            title: "Exam prep".to_string(),
            created_on: Utc::now(),
            tasks: vec![TaskEntry::pending("a", None), done],
            version: 0,
        };
        let summary = PlanSummary::from(&plan);
        assert_eq!(summary.task_count, 2);
        assert_eq!(summary.completed_count, 1);
    }
}
