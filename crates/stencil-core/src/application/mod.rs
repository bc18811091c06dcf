//! Application layer for Stencil.
//!
//! This layer contains:
//! - **Services**: the job orchestrator and its working directory
//! - **Registries**: scheme-keyed lookup of stage backends
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Stage and job failure types
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. All business rules live in `crate::domain`.

pub mod cancel;
pub mod error;
pub mod ports;
pub mod registry;
pub mod services;

pub use cancel::CancellationFlag;
pub use error::{PublishError, ScaffoldError, StageError};
pub use registry::{Registries, Registry};
pub use services::{
    DEFAULT_ENGINE, JobHandle, JobPlan, Orchestrator, OrchestratorSettings, WorkingDirectory,
};
