//! Per-course publish job registry.
//!
//! Publishes are long-running, so callers start them as background jobs and
//! poll for progress. The registry enforces the one-job-per-course rule:
//! while a job is running, a second start for the same course is rejected
//! instead of queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use courseforge_shared::{PublishConfig, PublishError, PublishRequest, Result};

use crate::pipeline::{self, ProgressReporter, PublishOutcome, Stage};
use crate::source::{CourseSource, ThemeResolver};

/// Observable state of one course's publish job.
enum JobState {
    Running(Arc<AtomicU8>),
    Finished(std::result::Result<PublishOutcome, String>),
}

/// What a poll reports back to the caller.
#[derive(Debug, Clone)]
pub enum PollStatus {
    /// No job is known for this course.
    NotFound,
    /// The job is still running; `progress` is 0–99.
    InFlight { progress: u8 },
    /// The job finished successfully.
    Succeeded(PublishOutcome),
    /// The job failed; carries the error message.
    Failed(String),
}

/// Progress reporter that publishes stage percentages for polling.
struct JobProgress {
    percent: Arc<AtomicU8>,
}

impl ProgressReporter for JobProgress {
    fn stage(&self, stage: Stage) {
        self.percent.store(stage.percent(), Ordering::Relaxed);
    }

    fn done(&self, _outcome: &PublishOutcome) {}
}

/// Registry of in-flight and finished publish jobs, keyed by course id.
///
/// Cheap to clone; clones share the same job table.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, JobState>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobState>> {
        // A panicked pipeline thread must not wedge every later poll.
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a publish job for a course on the blocking thread pool.
    ///
    /// Returns [`PublishError::InFlight`] if a job for the same course is
    /// already running. A finished job's entry is replaced by the new run.
    pub fn start(
        &self,
        config: Arc<PublishConfig>,
        request: PublishRequest,
        source: Arc<dyn CourseSource>,
        themes: Arc<dyn ThemeResolver>,
    ) -> Result<()> {
        let course_id = request.course_id.clone();
        let percent = Arc::new(AtomicU8::new(0));

        {
            let mut jobs = self.lock();
            if let Some(JobState::Running(_)) = jobs.get(&course_id) {
                return Err(PublishError::InFlight {
                    course_id: course_id.clone(),
                });
            }
            jobs.insert(course_id.clone(), JobState::Running(Arc::clone(&percent)));
        }
        info!(course = %course_id, mode = %request.mode, "publish job started");

        let registry = self.clone();
        tokio::task::spawn_blocking(move || {
            let progress = JobProgress {
                percent: Arc::clone(&percent),
            };
            let result = pipeline::run_publish(
                config.as_ref(),
                &request,
                source.as_ref(),
                themes.as_ref(),
                &progress,
            );
            let state = match result {
                Ok(outcome) => JobState::Finished(Ok(outcome)),
                Err(e) => {
                    warn!(course = %request.course_id, error = %e, "publish job failed");
                    JobState::Finished(Err(e.to_string()))
                }
            };
            registry.lock().insert(request.course_id.clone(), state);
        });

        Ok(())
    }

    /// Current status of a course's job. Finished results stay available
    /// until [`JobRegistry::take`] or a new start replaces them.
    pub fn poll(&self, course_id: &str) -> PollStatus {
        match self.lock().get(course_id) {
            None => PollStatus::NotFound,
            Some(JobState::Running(percent)) => PollStatus::InFlight {
                progress: percent.load(Ordering::Relaxed).min(99),
            },
            Some(JobState::Finished(Ok(outcome))) => PollStatus::Succeeded(outcome.clone()),
            Some(JobState::Finished(Err(message))) => PollStatus::Failed(message.clone()),
        }
    }

    /// Remove and return a finished job's result. Running jobs are left in
    /// place and `None` is returned for them.
    pub fn take(&self, course_id: &str) -> Option<std::result::Result<PublishOutcome, String>> {
        let mut jobs = self.lock();
        match jobs.get(course_id) {
            Some(JobState::Finished(_)) => match jobs.remove(course_id) {
                Some(JobState::Finished(result)) => Some(result),
                _ => None,
            },
            _ => None,
        }
    }
}
