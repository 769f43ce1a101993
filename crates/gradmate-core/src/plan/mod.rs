//! Study plan task management.
//!
//! - [`types`]: task views, patches and summaries.
//! - [`prompt`]: generator prompts and response parsing.
//! - [`service`]: [`StudyPlanTaskManager`], the list/create/update/delete/
//!   generate operations over a [`crate::store::PlanStore`].

pub mod prompt;
pub mod service;
pub mod types;

pub use service::{ManagerConfig, StudyPlanTaskManager};
pub use types::{GenerationOutcome, PlanSummary, TaskPatch, TaskView};
