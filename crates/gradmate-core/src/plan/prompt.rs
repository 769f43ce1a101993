//! Prompt construction and AI response parsing for study plans.

use chrono::{Days, NaiveDate};
use serde_json::Value;

use gradmate_db::models::TaskEntry;

use crate::due::normalize_due_date;
use crate::error::StudyPlanError;
use crate::store::excerpt;

use super::types::is_reserved;

/// Longest plan title accepted from the generator or built as a fallback.
pub const MAX_TITLE_CHARS: usize = 60;

/// Prompt asking for `count` tasks over the week after `today`.
pub fn build_task_prompt(request: &str, count: usize, today: NaiveDate) -> String {
    let first = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let last = today.checked_add_days(Days::new(7)).unwrap_or(today);
    format!(
        "You are a study planner for university students preparing for exams and placements.\n\
         Break the request below into exactly {count} concrete, actionable study tasks.\n\
         Spread the due dates over the next 7 days, from {first} to {last}.\n\
         \n\
         Request: {request}\n\
         \n\
         Respond with JSON only, without code fences or commentary, in exactly this shape:\n\
         {{\"tasks\": [{{\"task\": \"<short task title>\", \"due_date\": \"<ISO 8601 date>\", \"status\": \"pending\"}}]}}"
    )
}

/// Prompt asking for a plan title derived from `seed`.
pub fn build_title_prompt(seed: &str) -> String {
    format!(
        "Suggest a short, motivating title (at most 6 words) for a study plan \
         built around this goal: \"{seed}\". Reply with the title only."
    )
}

/// Accept a single enclosing ``` fence, with or without a language tag.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    body.trim_start_matches(|c: char| c.is_ascii_alphanumeric())
        .trim()
}

/// Parse a `{"tasks": [...]}` generator response.
///
/// Every entry must be an object with a non-empty `task` string; anything
/// else fails the whole response. Due dates are normalized, a missing or
/// `null` status becomes `pending`, and addressing keys such as `id` or
/// `completed` are dropped.
pub fn parse_generated_tasks(raw: &str) -> Result<Vec<TaskEntry>, StudyPlanError> {
    let invalid = |msg: String| StudyPlanError::AiResponseInvalid(msg);

    let doc: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| invalid(format!("response is not valid JSON: {e}")))?;
    let items = match doc.get("tasks") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) => return Err(invalid("`tasks` is empty".to_string())),
        Some(_) => return Err(invalid("`tasks` is not a list".to_string())),
        None => return Err(invalid("response has no `tasks` field".to_string())),
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let title = item
                .get("task")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| invalid(format!("task {idx} has no `task` title")))?;
            let mut entry: TaskEntry = serde_json::from_value(item.clone())
                .map_err(|e| invalid(format!("task {idx} is malformed: {e}")))?;
            entry.task = title.to_owned();
            entry.due_date = normalize_due_date(entry.due_date.as_deref());
            entry.extra.retain(|key, _| !is_reserved(key));
            Ok(entry)
        })
        .collect()
}

/// Clean a generated title. `None` when the text is unusable.
pub fn clean_title(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.starts_with("Error:") {
        return None;
    }
    let decoration = |c: char| matches!(c, '"' | '\'' | '*' | '#') || c.is_whitespace();
    let title = line.trim_matches(decoration);
    let title = title
        .strip_prefix("Title:")
        .unwrap_or(title)
        .trim_matches(decoration);
    if title.is_empty() {
        return None;
    }
    Some(excerpt(title, MAX_TITLE_CHARS))
}

/// Deterministic title used when generation fails.
pub fn fallback_title(seed: &str) -> String {
    excerpt(&format!("Study Plan: {}", seed.trim()), MAX_TITLE_CHARS)
}
