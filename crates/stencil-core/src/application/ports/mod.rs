//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `stencil-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Stage ports**: one per pipeline stage, selected by scheme at runtime
//!   - `Preparer`: fetch a template source into a local directory
//!   - `Templater`: render a template directory into an output directory
//!   - `Publisher`: create a remote repository and push the rendered tree
//!
//! - **Infrastructure ports**: consumed by adapters, not by the orchestrator
//!   - `SandboxRuntime`: run a command inside a disposable container

pub mod sandbox;
pub mod stages;

pub use sandbox::{Mount, SandboxOutput, SandboxRuntime, SandboxSpec};
pub use stages::{Preparer, Publisher, Templater};

#[cfg(test)]
pub use sandbox::MockSandboxRuntime;
#[cfg(test)]
pub use stages::{MockPreparer, MockPublisher, MockTemplater};
