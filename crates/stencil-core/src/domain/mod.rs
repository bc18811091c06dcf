// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for Stencil.
//!
//! Pure data and rules: what a scaffold request looks like, what a published
//! repository looks like, and how a job moves through its stages. No I/O
//! happens here; fetching, rendering and publishing are ports defined in
//! `crate::application`.
//!
//! - **No I/O**: No filesystem, network, or process calls
//! - **Validated construction**: descriptors and targets are checked once,
//!   at build time, so the pipeline never sees a malformed request
//! - **Explicit state machine**: [`Job`] rejects out-of-order transitions

pub mod descriptor;
pub mod error;
pub mod job;
pub mod repository;

mod validation;

pub use descriptor::{
    Parameters, PublishTarget, TemplateDescriptor, TemplateDescriptorBuilder, TemplateLocation,
};
pub use error::{DomainError, ErrorCategory, ErrorKind};
pub use job::{Job, JobId, JobState, Stage, Transition};
pub use repository::{RemoteRepository, Visibility};
pub use validation::DomainValidator;
