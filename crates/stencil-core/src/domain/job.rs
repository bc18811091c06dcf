//! Job state machine.
//!
//! ```text
//! Created ─► Preparing ─► Templating ─► Publishing ─► Done
//!    │           │             │             │
//!    └───────────┴─────────────┴─────────────┴──► Failed { stage, kind }
//! ```
//!
//! `Created → Failed` only happens when a backend cannot be resolved; the
//! failure is attributed to the stage whose registry lacked the scheme.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DomainError, ErrorKind, RemoteRepository};

/// Unique identifier of one scaffold job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three active pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preparing,
    Templating,
    Publishing,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Preparing, Stage::Templating, Stage::Publishing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Templating => "templating",
            Self::Publishing => "publishing",
        }
    }

    /// Name of the registry that serves this stage.
    pub fn registry(&self) -> &'static str {
        match self {
            Self::Preparing => "preparer",
            Self::Templating => "templater",
            Self::Publishing => "publisher",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
    Created,
    Preparing,
    Templating,
    Publishing,
    Done { repository: RemoteRepository },
    Failed { stage: Stage, kind: ErrorKind },
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Preparing => "preparing",
            Self::Templating => "templating",
            Self::Publishing => "publishing",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// The stage currently running, if any.
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            Self::Preparing => Some(Stage::Preparing),
            Self::Templating => Some(Stage::Templating),
            Self::Publishing => Some(Stage::Publishing),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

impl From<Stage> for JobState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Preparing => Self::Preparing,
            Stage::Templating => Self::Templating,
            Stage::Publishing => Self::Publishing,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { stage, kind } => write!(f, "failed({stage}, {kind})"),
            Self::Done { repository } => write!(f, "done({})", repository.full_name()),
            other => f.write_str(other.name()),
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub state: JobState,
    pub at: DateTime<Utc>,
}

/// A single Prepare → Template → Publish execution.
///
/// Ephemeral: lives as long as the run and is never persisted.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    state: JobState,
    history: Vec<Transition>,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Created,
            history: vec![Transition {
                state: JobState::Created,
                at: Utc::now(),
            }],
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Enter `stage`. Only the next stage in order is accepted.
    pub fn start(&mut self, stage: Stage) -> Result<(), DomainError> {
        let allowed = matches!(
            (&self.state, stage),
            (JobState::Created, Stage::Preparing)
                | (JobState::Preparing, Stage::Templating)
                | (JobState::Templating, Stage::Publishing)
        );
        if !allowed {
            return Err(self.invalid(stage.as_str()));
        }
        self.record(stage.into());
        Ok(())
    }

    /// Finish successfully. Only valid while publishing.
    pub fn complete(&mut self, repository: RemoteRepository) -> Result<(), DomainError> {
        if self.state != JobState::Publishing {
            return Err(self.invalid("done"));
        }
        self.record(JobState::Done { repository });
        Ok(())
    }

    /// Fail from any non-terminal state.
    pub fn fail(&mut self, stage: Stage, kind: ErrorKind) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(self.invalid("failed"));
        }
        self.record(JobState::Failed { stage, kind });
        Ok(())
    }

    fn record(&mut self, state: JobState) {
        self.history.push(Transition {
            state: state.clone(),
            at: Utc::now(),
        });
        self.state = state;
    }

    fn invalid(&self, to: &str) -> DomainError {
        DomainError::InvalidTransition {
            from: self.state.name().to_string(),
            to: to.to_string(),
        }
    }
}
