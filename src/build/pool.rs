//! Job channel and worker pool.
//!
//! Targets are handed to workers one at a time over a rendezvous channel, so
//! the coordinator blocks while every worker is busy and never more than
//! `workers` builds run at once. Dropping the sender is the only termination
//! signal: workers drain the channel and exit when it reports disconnection.

use super::action::{BuildAction, BuildJob};
use super::error::{ActionError, JobFailure};
use crate::cancel::CancelToken;
use crate::target::BuildTarget;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread;
use tracing::{debug, error};

/// Read-only data shared by every worker of one run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub project: &'a str,
    pub version: &'a str,
    pub source_dir: &'a Path,
    pub output_dir: &'a Path,
}

impl RunContext<'_> {
    fn job(&self, target: BuildTarget) -> BuildJob<'_> {
        BuildJob {
            target,
            version: self.version,
            source_dir: self.source_dir,
            output_path: self
                .output_dir
                .join(target.artifact_name(self.project, self.version)),
        }
    }
}

/// What happened to one target during a run.
#[derive(Debug)]
pub enum JobOutcome {
    Built(BuildTarget),
    Failed(JobFailure),
    /// Not started, or stopped midway, because the run was cancelled
    Skipped(BuildTarget),
}

impl JobOutcome {
    pub fn target(&self) -> BuildTarget {
        match self {
            JobOutcome::Built(target) | JobOutcome::Skipped(target) => *target,
            JobOutcome::Failed(failure) => failure.target,
        }
    }
}

/// Build every target with `workers` threads and return one outcome per
/// target.
///
/// The first failure cancels `cancel`; targets not yet started are then
/// reported as [`JobOutcome::Skipped`] instead of being built. `observer`
/// is called from the worker threads as each outcome is decided.
pub fn dispatch<A>(
    targets: &[BuildTarget],
    workers: usize,
    ctx: RunContext<'_>,
    action: &A,
    cancel: &CancelToken,
    observer: &(dyn Fn(&JobOutcome) + Sync),
) -> Vec<JobOutcome>
where
    A: BuildAction + ?Sized,
{
    let workers = workers.max(1);
    let (job_tx, job_rx) = mpsc::sync_channel::<BuildTarget>(0);
    let (done_tx, done_rx) = mpsc::channel::<JobOutcome>();
    let job_rx = Mutex::new(job_rx);

    let not_sent = thread::scope(|s| {
        for id in 0..workers {
            let done_tx = done_tx.clone();
            let job_rx = &job_rx;
            s.spawn(move || worker(id, job_rx, done_tx, ctx, action, cancel, observer));
        }
        drop(done_tx);

        let mut not_sent = Vec::new();
        for (idx, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                not_sent.extend_from_slice(&targets[idx..]);
                break;
            }
            if let Err(mpsc::SendError(target)) = job_tx.send(*target) {
                // every worker is gone; nothing will take the rest
                not_sent.push(target);
                not_sent.extend_from_slice(&targets[idx + 1..]);
                break;
            }
        }
        drop(job_tx);
        not_sent
    });

    let mut outcomes: Vec<JobOutcome> = done_rx.into_iter().collect();
    for target in not_sent {
        let outcome = JobOutcome::Skipped(target);
        observer(&outcome);
        outcomes.push(outcome);
    }
    outcomes
}

fn worker<A>(
    id: usize,
    jobs: &Mutex<Receiver<BuildTarget>>,
    done: Sender<JobOutcome>,
    ctx: RunContext<'_>,
    action: &A,
    cancel: &CancelToken,
    observer: &(dyn Fn(&JobOutcome) + Sync),
) where
    A: BuildAction + ?Sized,
{
    loop {
        let next = jobs.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(target) = next else {
            break;
        };

        let outcome = if cancel.is_cancelled() {
            JobOutcome::Skipped(target)
        } else {
            debug!(worker = id, job = %target, "building");
            run_job(ctx, target, action, cancel)
        };

        if let JobOutcome::Failed(failure) = &outcome {
            error!(
                job = %failure.target,
                version = %failure.version,
                "{}",
                failure
            );
            cancel.cancel();
        }

        observer(&outcome);
        if done.send(outcome).is_err() {
            break;
        }
    }
}

fn run_job<A>(
    ctx: RunContext<'_>,
    target: BuildTarget,
    action: &A,
    cancel: &CancelToken,
) -> JobOutcome
where
    A: BuildAction + ?Sized,
{
    let job = ctx.job(target);
    let result = panic::catch_unwind(AssertUnwindSafe(|| action.build(&job, cancel)))
        .unwrap_or_else(|_| Err(ActionError::Other("build action panicked".to_string())));

    match result {
        Ok(()) => JobOutcome::Built(target),
        // stopped by someone else; the cause is reported elsewhere
        Err(ActionError::Cancelled) if cancel.is_cancelled() => JobOutcome::Skipped(target),
        Err(error) => JobOutcome::Failed(JobFailure {
            target,
            version: ctx.version.to_string(),
            error,
        }),
    }
}
