//! Postgres persistence for GradMate study plans.
//!
//! Study plans are stored document-style: one row per plan with the task
//! list embedded as a JSONB array, plus an append-only `usage_logs` table
//! for AI feature auditing.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
