//! Application services - orchestrate use cases.
//!
//! The single use case is "scaffold a repository": the orchestrator drives
//! one job through Prepare, Template and Publish inside a private working
//! directory.

pub mod orchestrator;
pub mod workspace;

pub use orchestrator::{DEFAULT_ENGINE, JobHandle, JobPlan, Orchestrator, OrchestratorSettings};
pub use workspace::WorkingDirectory;
