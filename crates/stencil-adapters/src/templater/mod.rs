//! Templaters: render a prepared template into the output directory.
//!
//! `simple` runs in-process. `cookiecutter` and `cra` execute third-party
//! generators and only ever do so through a [`SandboxRuntime`].
//!
//! [`SandboxRuntime`]: stencil_core::application::ports::SandboxRuntime

mod cookiecutter;
mod cra;
mod simple;

pub use cookiecutter::{CookiecutterTemplater, DEFAULT_COOKIECUTTER_IMAGE, merge_context};
pub use cra::{CraTemplater, DEFAULT_NODE_IMAGE};
pub use simple::{CONTROL_FILE, PlaceholderError, SimpleTemplater, render};
