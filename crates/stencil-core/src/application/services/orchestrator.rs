//! Orchestrator - runs one scaffold job end to end.
//!
//! For every job it:
//! 1. Resolves the preparer, templater and publisher by scheme (before any I/O)
//! 2. Creates an exclusive working directory
//! 3. Prepares into `template/`, renders into `output/`, publishes `output/`
//! 4. Releases the working directory, whatever the outcome
//!
//! Stages never overlap and are never retried. Each stage races against the
//! job's cancellation flag and the optional per-stage timeout.

use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{error, info, instrument, warn};

use crate::{
    application::{
        CancellationFlag, PublishError, Registries, ScaffoldError, StageError,
        ports::{Preparer, Publisher, Templater},
        services::WorkingDirectory,
    },
    domain::{ErrorKind, Job, JobId, JobState, RemoteRepository, Stage, TemplateDescriptor},
};

/// Engine used when a descriptor does not name one.
pub const DEFAULT_ENGINE: &str = "cookiecutter";

/// Orchestrator configuration, resolved by the assembling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Parent of per-job working directories; system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
    pub default_engine: String,
    /// Upper bound for each individual stage.
    pub stage_timeout: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            workspace_root: None,
            default_engine: DEFAULT_ENGINE.to_string(),
            stage_timeout: None,
        }
    }
}

/// Schemes a descriptor resolves to, one per stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    pub preparer: String,
    pub templater: String,
    pub publisher: String,
}

impl JobPlan {
    pub fn scheme(&self, stage: Stage) -> &str {
        match stage {
            Stage::Preparing => &self.preparer,
            Stage::Templating => &self.templater,
            Stage::Publishing => &self.publisher,
        }
    }
}

struct Backends {
    preparer: Arc<dyn Preparer>,
    templater: Arc<dyn Templater>,
    publisher: Arc<dyn Publisher>,
}

/// Stage failure before it is attributed to a job.
struct StageFailure {
    error: StageError,
    repository: Option<RemoteRepository>,
}

impl From<StageError> for StageFailure {
    fn from(error: StageError) -> Self {
        Self {
            error,
            repository: None,
        }
    }
}

impl From<PublishError> for StageFailure {
    fn from(err: PublishError) -> Self {
        Self {
            error: err.error,
            repository: err.repository,
        }
    }
}

/// Runs scaffold jobs against a frozen set of registries.
///
/// Cheap to clone; clones share the registries and settings, so independent
/// jobs can run concurrently.
#[derive(Clone)]
pub struct Orchestrator {
    registries: Arc<Registries>,
    settings: Arc<OrchestratorSettings>,
}

impl Orchestrator {
    /// Freeze `registries` and build an orchestrator around them.
    pub fn new(registries: Registries, settings: OrchestratorSettings) -> Self {
        info!(
            preparers = ?registries.preparers.schemes(),
            templaters = ?registries.templaters.schemes(),
            publishers = ?registries.publishers.schemes(),
            "Orchestrator ready"
        );
        Self {
            registries: Arc::new(registries),
            settings: Arc::new(settings),
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Resolve every backend for `descriptor` without running anything.
    pub fn plan(&self, descriptor: &TemplateDescriptor) -> Result<JobPlan, ScaffoldError> {
        let job_id = JobId::new();
        let plan = self.plan_for(descriptor);
        self.resolve(&plan)
            .map(|_| plan.clone())
            .map_err(|(stage, error)| ScaffoldError {
                job_id,
                stage,
                scheme: plan.scheme(stage).to_string(),
                error,
                repository: None,
            })
    }

    /// Run one job to completion on the current task.
    pub async fn run_scaffold(
        &self,
        descriptor: TemplateDescriptor,
    ) -> Result<RemoteRepository, ScaffoldError> {
        let (status, _) = watch::channel(JobState::Created);
        self.execute(JobId::new(), descriptor, CancellationFlag::new(), status)
            .await
    }

    /// Spawn one job on the runtime and return a handle to observe or cancel it.
    pub fn submit(&self, descriptor: TemplateDescriptor) -> JobHandle {
        let id = JobId::new();
        let cancel = CancellationFlag::new();
        let (status_tx, status_rx) = watch::channel(JobState::Created);

        let this = self.clone();
        let flag = cancel.clone();
        let task =
            tokio::spawn(async move { this.execute(id, descriptor, flag, status_tx).await });

        JobHandle {
            id,
            status: status_rx,
            cancel,
            task,
        }
    }

    fn plan_for(&self, descriptor: &TemplateDescriptor) -> JobPlan {
        JobPlan {
            preparer: descriptor.location().scheme().to_string(),
            templater: descriptor
                .engine()
                .unwrap_or(&self.settings.default_engine)
                .to_string(),
            publisher: descriptor.target().scheme.clone(),
        }
    }

    fn resolve(&self, plan: &JobPlan) -> Result<Backends, (Stage, StageError)> {
        let preparer = self
            .registries
            .preparers
            .get(&plan.preparer)
            .map_err(|e| (Stage::Preparing, e))?;
        let templater = self
            .registries
            .templaters
            .get(&plan.templater)
            .map_err(|e| (Stage::Templating, e))?;
        let publisher = self
            .registries
            .publishers
            .get(&plan.publisher)
            .map_err(|e| (Stage::Publishing, e))?;
        Ok(Backends {
            preparer,
            templater,
            publisher,
        })
    }

    #[instrument(skip_all, fields(job_id = %job_id))]
    async fn execute(
        &self,
        job_id: JobId,
        descriptor: TemplateDescriptor,
        cancel: CancellationFlag,
        status: watch::Sender<JobState>,
    ) -> Result<RemoteRepository, ScaffoldError> {
        let mut tracker = Tracker::new(job_id, status);
        let plan = self.plan_for(&descriptor);
        info!(
            location = %descriptor.location(),
            engine = %plan.templater,
            target = %descriptor.target(),
            "Job started"
        );

        let fail = |tracker: &mut Tracker, stage: Stage, failure: StageFailure| {
            tracker.fail(stage, failure.error.kind());
            ScaffoldError {
                job_id,
                stage,
                scheme: plan.scheme(stage).to_string(),
                error: failure.error,
                repository: failure.repository,
            }
        };

        let backends = match self.resolve(&plan) {
            Ok(backends) => backends,
            Err((stage, error)) => return Err(fail(&mut tracker, stage, error.into())),
        };

        let workdir =
            match WorkingDirectory::create(job_id, self.settings.workspace_root.as_deref()) {
                Ok(workdir) => workdir,
                Err(error) => return Err(fail(&mut tracker, Stage::Preparing, error.into())),
            };
        let result = self
            .run_stages(job_id, &descriptor, &plan, &backends, &workdir, &cancel, &mut tracker)
            .await;

        // Released before the outcome is reported; failure to clean up does
        // not change the job's outcome.
        let _ = workdir.close();

        match result {
            Ok(repository) => {
                tracker.complete(repository.clone());
                info!(repository = %repository, url = %repository.remote_url, "Job completed");
                Ok(repository)
            }
            Err((stage, failure)) => Err(fail(&mut tracker, stage, failure)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages(
        &self,
        job_id: JobId,
        descriptor: &TemplateDescriptor,
        plan: &JobPlan,
        backends: &Backends,
        workdir: &WorkingDirectory,
        cancel: &CancellationFlag,
        tracker: &mut Tracker,
    ) -> Result<RemoteRepository, (Stage, StageFailure)> {
        let template_dir = workdir.template_dir();
        let output_dir = workdir.output_dir();

        tracker.start(Stage::Preparing);
        let prepare = backends
            .preparer
            .prepare(descriptor.location(), &template_dir);
        self.guarded(job_id, Stage::Preparing, &plan.preparer, cancel, async {
            prepare.await.map_err(StageFailure::from)
        })
        .await
        .map_err(|f| (Stage::Preparing, f))?;

        tracker.start(Stage::Templating);
        let template = backends
            .templater
            .template(&template_dir, descriptor.parameters(), &output_dir);
        self.guarded(job_id, Stage::Templating, &plan.templater, cancel, async {
            template.await.map_err(StageFailure::from)
        })
        .await
        .map_err(|f| (Stage::Templating, f))?;

        tracker.start(Stage::Publishing);
        let publish = backends.publisher.publish(&output_dir, descriptor.target());
        self.guarded(job_id, Stage::Publishing, &plan.publisher, cancel, async {
            publish.await.map_err(StageFailure::from)
        })
        .await
        .map_err(|f| (Stage::Publishing, f))
    }

    /// Run one stage future, bounded by cancellation and the stage timeout.
    #[instrument(skip_all, fields(job_id = %job_id, stage = %stage, scheme = %scheme))]
    async fn guarded<T, F>(
        &self,
        job_id: JobId,
        stage: Stage,
        scheme: &str,
        cancel: &CancellationFlag,
        work: F,
    ) -> Result<T, StageFailure>
    where
        F: Future<Output = Result<T, StageFailure>>,
    {
        let started = Instant::now();
        let bounded = async {
            match self.settings.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => Err(StageError::Timeout { after: limit }.into()),
                },
                None => work.await,
            }
        };

        let result: Result<T, StageFailure> = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::Cancelled.into()),
            result = bounded => result,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(duration_ms, outcome = "ok", "Stage finished"),
            Err(failure) => warn!(
                duration_ms,
                outcome = %failure.error.kind(),
                error = %failure.error,
                "Stage failed"
            ),
        }
        result
    }
}

/// Keeps the job state machine and the status channel in step.
struct Tracker {
    job: Job,
    status: watch::Sender<JobState>,
}

impl Tracker {
    fn new(id: JobId, status: watch::Sender<JobState>) -> Self {
        let job = Job::new(id);
        status.send_replace(job.state().clone());
        Self { job, status }
    }

    fn start(&mut self, stage: Stage) {
        let outcome = self.job.start(stage);
        self.settle(outcome);
    }

    fn complete(&mut self, repository: RemoteRepository) {
        let outcome = self.job.complete(repository);
        self.settle(outcome);
    }

    fn fail(&mut self, stage: Stage, kind: ErrorKind) {
        let outcome = self.job.fail(stage, kind);
        self.settle(outcome);
    }

    fn settle(&mut self, outcome: Result<(), crate::domain::DomainError>) {
        match outcome {
            Ok(()) => {
                info!(state = %self.job.state(), "Job state changed");
                self.status.send_replace(self.job.state().clone());
            }
            Err(err) => error!(job_id = %self.job.id(), error = %err, "Rejected job transition"),
        }
    }
}

/// Handle to a job started with [`Orchestrator::submit`].
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    status: watch::Receiver<JobState>,
    cancel: CancellationFlag,
    task: JoinHandle<Result<RemoteRepository, ScaffoldError>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> JobState {
        self.status.borrow().clone()
    }

    /// Receiver that observes every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.status.clone()
    }

    /// Request cancellation. The running stage is dropped at its next await.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Wait for the job to reach a terminal state.
    ///
    /// A panic inside the job is resumed on the caller.
    pub async fn wait(self) -> Result<RemoteRepository, ScaffoldError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                let stage = self
                    .status
                    .borrow()
                    .active_stage()
                    .unwrap_or(Stage::Preparing);
                Err(ScaffoldError {
                    job_id: self.id,
                    stage,
                    scheme: String::new(),
                    error: StageError::Cancelled,
                    repository: None,
                })
            }
        }
    }
}
