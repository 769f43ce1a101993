//! Study plan task management and AI study helpers for GradMate.

pub mod assist;
pub mod due;
pub mod error;
pub mod generator;
pub mod ident;
pub mod plan;
pub mod store;

pub use error::StudyPlanError;
