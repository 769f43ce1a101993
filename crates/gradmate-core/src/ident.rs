//! Composite task identifiers.
//!
//! Embedded tasks have no id of their own. Callers address one as
//! `<plan id>:<task title>`; the title may itself contain `:`, so parsing
//! splits on the first separator only.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::StudyPlanError;

/// Separator between the plan id and the task title.
pub const SEPARATOR: char = ':';

/// A parsed composite task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub plan_id: Uuid,
    pub title: String,
}

impl TaskRef {
    pub fn new(plan_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            plan_id,
            title: title.into(),
        }
    }
}

/// Build the external identifier for a task.
pub fn composite_id(plan_id: Uuid, title: &str) -> String {
    format!("{plan_id}{SEPARATOR}{title}")
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.plan_id, self.title)
    }
}

impl FromStr for TaskRef {
    type Err = StudyPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (plan, title) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| StudyPlanError::InvalidIdentifier(s.to_owned()))?;
        let plan_id =
            Uuid::parse_str(plan).map_err(|_| StudyPlanError::InvalidIdentifier(s.to_owned()))?;
        Ok(Self::new(plan_id, title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_separator_only() {
        let plan_id = Uuid::new_v4();
        let id = composite_id(plan_id, "Ch 3: Graphs: BFS");
        let parsed: TaskRef = id.parse().unwrap();
        assert_eq!(parsed.plan_id, plan_id);
        assert_eq!(parsed.title, "Ch 3: Graphs: BFS");
    }

    #[test]
    fn display_matches_composite_id() {
        let task_ref = TaskRef::new(Uuid::nil(), "Resume review");
        assert_eq!(
            task_ref.to_string(),
            composite_id(Uuid::nil(), "Resume review")
        );
    }

    #[test]
    fn missing_separator_is_invalid() {
        let err = Uuid::new_v4().to_string().parse::<TaskRef>().unwrap_err();
        assert!(matches!(err, StudyPlanError::InvalidIdentifier(_)));
    }

    #[test]
    fn non_uuid_plan_is_invalid() {
        let err = "plan-7:Read Ch1".parse::<TaskRef>().unwrap_err();
        assert!(matches!(err, StudyPlanError::InvalidIdentifier(_)));

        let err = ":Read Ch1".parse::<TaskRef>().unwrap_err();
        assert!(matches!(err, StudyPlanError::InvalidIdentifier(_)));
    }

    #[test]
    fn empty_title_parses() {
        let plan_id = Uuid::new_v4();
        let parsed: TaskRef = format!("{plan_id}:").parse().unwrap();
        assert_eq!(parsed.title, "");
    }
}
