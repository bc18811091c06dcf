//! Isolated execution for templaters that run third-party generators.

mod container;

pub use container::{ContainerRuntime, DEFAULT_SANDBOX_TIMEOUT, owner_of, tail};
