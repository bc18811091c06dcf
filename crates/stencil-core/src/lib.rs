//! Stencil Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for the Stencil
//! repository scaffolder, following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          stencil-cli (assembly)         │
//! │  (config, logging, registry wiring)     │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │             Orchestrator                │
//! │   Prepare → Template → Publish per job  │
//! └──────────────────┬──────────────────────┘
//!                    │ resolves via Registry<dyn Port>
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        Application Ports (Traits)       │
//! │ (Preparer, Templater, Publisher,        │
//! │  SandboxRuntime)                        │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │    stencil-adapters (Infrastructure)    │
//! │ (file/github/gitlab, cookiecutter, ...) │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (TemplateDescriptor, Job, Repository)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stencil_core::prelude::*;
//!
//! # async fn run(file: Arc<dyn Preparer>, simple: Arc<dyn Templater>, github: Arc<dyn Publisher>) {
//! let mut registries = Registries::new();
//! registries.preparers.register("file", file);
//! registries.templaters.register("simple", simple);
//! registries.publishers.register_aliases(&["github", "github/api"], github);
//!
//! let orchestrator = Orchestrator::new(registries, OrchestratorSettings::default());
//!
//! let descriptor = TemplateDescriptor::builder()
//!     .location("file:/tmp/tpl")
//!     .engine("simple")
//!     .target(PublishTarget::new("github", "acme", "demo").with_visibility(Visibility::Private))
//!     .parameter("name", "demo")
//!     .build()
//!     .unwrap();
//!
//! let repository = orchestrator.run_scaffold(descriptor).await.unwrap();
//! println!("{}", repository.remote_url);
//! # }
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        CancellationFlag, JobHandle, Orchestrator, OrchestratorSettings, PublishError,
        Registries, Registry, ScaffoldError, StageError,
        ports::{Mount, Preparer, Publisher, SandboxOutput, SandboxRuntime, SandboxSpec, Templater},
    };
    pub use crate::domain::{
        ErrorKind, Job, JobId, JobState, Parameters, PublishTarget, RemoteRepository, Stage,
        TemplateDescriptor, TemplateLocation, Visibility,
    };
    pub use crate::error::{StencilError, StencilResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
