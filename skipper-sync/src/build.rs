//! Build orchestration: trigger, resolve queue items, poll to completion.
//!
//! Three phases over an explicit working set, all on the calling thread:
//!
//! - **A** trigger every job back-to-back and keep its queue handle.
//! - **B** sweep queue handles until each resolves to a build location. A
//!   handle the server no longer knows (or a cancelled item) leaves the
//!   job's fate unknown; that is not an error.
//! - **C** sweep build locations until each reports a result.
//!
//! The scheduler sleeps one interval between sweeps while work remains.
//! With a maximum wait, jobs still unresolved when it runs out are reported
//! as timed out.

use serde::Serialize;

use skipper_remote::{BuildLocation, BuildStatus, JobServer, QueueHandle, QueueStatus, RemoteError};

use crate::schedule::{PollPolicy, Scheduler};
use crate::SyncError;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A build and what the server reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub location: BuildLocation,
    pub status: BuildStatus,
    /// Sub-runs of a multi-configuration build.
    pub sub_runs: Vec<BuildLocation>,
}

/// Final state of one requested build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BuildOutcome {
    Finished(BuildResult),
    /// The queue item vanished before a build was assigned.
    Unknown,
    /// The maximum wait ran out.
    TimedOut { last_location: Option<BuildLocation> },
}

impl BuildOutcome {
    /// Whether the build finished with `SUCCESS`.
    pub fn is_success(&self) -> bool {
        match self {
            BuildOutcome::Finished(result) => result.status.outcome().is_some_and(|o| o.is_success()),
            _ => false,
        }
    }
}

/// Outcome for one job, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobBuild {
    pub job: String,
    pub outcome: BuildOutcome,
}

/// A triggered build waiting in the server queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggered {
    pub job: String,
    pub handle: QueueHandle,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct BuildOrchestrator<'a, S: JobServer + ?Sized> {
    server: &'a S,
    policy: PollPolicy,
}

impl<'a, S: JobServer + ?Sized> BuildOrchestrator<'a, S> {
    pub fn new(server: &'a S, policy: PollPolicy) -> Self {
        Self { server, policy }
    }

    /// Phase A: request a build of every job, in order.
    pub fn trigger(
        &self,
        jobs: &[String],
        parameters: &[(String, String)],
    ) -> Result<Vec<Triggered>, SyncError> {
        let mut triggered = Vec::with_capacity(jobs.len());
        for job in jobs {
            let handle = self.server.trigger_build(job, parameters)?;
            tracing::info!("triggered build of '{}' ({})", job, handle);
            triggered.push(Triggered {
                job: job.clone(),
                handle,
            });
        }
        Ok(triggered)
    }

    /// Phases B and C: wait for every triggered build to finish.
    pub fn wait(
        &self,
        triggered: Vec<Triggered>,
        scheduler: &mut dyn Scheduler,
    ) -> Result<Vec<JobBuild>, SyncError> {
        let started = scheduler.elapsed();
        let mut outcomes: Vec<Option<BuildOutcome>> = vec![None; triggered.len()];
        let jobs: Vec<String> = triggered.iter().map(|t| t.job.clone()).collect();

        // Phase B
        let mut queued: Vec<(usize, QueueHandle)> = triggered
            .into_iter()
            .enumerate()
            .map(|(i, t)| (i, t.handle))
            .collect();
        let mut running: Vec<(usize, BuildLocation)> = Vec::new();
        while !queued.is_empty() {
            let mut waiting = Vec::with_capacity(queued.len());
            for (i, handle) in queued {
                match self.server.queue_item(&handle) {
                    Ok(QueueStatus::Ready(location)) => {
                        tracing::debug!("'{}' is build {}", jobs[i], location);
                        running.push((i, location));
                    }
                    Ok(QueueStatus::Queued) => waiting.push((i, handle)),
                    Ok(QueueStatus::Cancelled) | Err(RemoteError::QueueItemNotFound { .. }) => {
                        tracing::warn!("'{}': unknown status", jobs[i]);
                        outcomes[i] = Some(BuildOutcome::Unknown);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            queued = waiting;
            if queued.is_empty() {
                break;
            }
            if self.policy.expired(scheduler.elapsed() - started) {
                for (i, _) in queued.drain(..) {
                    outcomes[i] = Some(BuildOutcome::TimedOut { last_location: None });
                }
                break;
            }
            scheduler.sleep(self.policy.interval);
        }

        // Phase C
        while !running.is_empty() {
            let mut pending = Vec::with_capacity(running.len());
            for (i, location) in running {
                let info = self.server.build_info(&location)?;
                match info.status {
                    BuildStatus::Terminal(outcome) => {
                        tracing::info!("'{}' finished: {}", jobs[i], outcome);
                        outcomes[i] = Some(BuildOutcome::Finished(BuildResult {
                            location,
                            status: info.status,
                            sub_runs: info.runs,
                        }));
                    }
                    BuildStatus::Pending => pending.push((i, location)),
                }
            }
            running = pending;
            if running.is_empty() {
                break;
            }
            if self.policy.expired(scheduler.elapsed() - started) {
                for (i, location) in running.drain(..) {
                    outcomes[i] = Some(BuildOutcome::TimedOut {
                        last_location: Some(location),
                    });
                }
                break;
            }
            scheduler.sleep(self.policy.interval);
        }

        Ok(jobs
            .into_iter()
            .zip(outcomes)
            .map(|(job, outcome)| JobBuild {
                job,
                outcome: outcome.unwrap_or(BuildOutcome::Unknown),
            })
            .collect())
    }

    /// Trigger `jobs` and wait for all of them.
    pub fn run(
        &self,
        jobs: &[String],
        parameters: &[(String, String)],
        scheduler: &mut dyn Scheduler,
    ) -> Result<Vec<JobBuild>, SyncError> {
        let triggered = self.trigger(jobs, parameters)?;
        self.wait(triggered, scheduler)
    }
}

// ---------------------------------------------------------------------------
// Presentation tree
// ---------------------------------------------------------------------------

/// Which builds get their console log attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogPolicy {
    /// Only finished, non-successful builds without sub-runs.
    #[default]
    FailuresOnly,
    /// Every finished build without sub-runs.
    Always,
}

/// A build with its sub-runs nested below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultNode {
    pub name: String,
    pub location: BuildLocation,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    pub children: Vec<ResultNode>,
}

impl ResultNode {
    /// `"in progress"` for pending builds, the lowercase result otherwise.
    pub fn status_label(&self) -> String {
        match self.status {
            BuildStatus::Pending => "in progress".to_string(),
            BuildStatus::Terminal(outcome) => outcome.as_str().to_lowercase(),
        }
    }
}

/// Build the presentation tree for a build whose status and sub-runs are
/// already known. Sub-runs are fetched from the server.
pub fn describe_result<S: JobServer + ?Sized>(
    server: &S,
    name: &str,
    result: &BuildResult,
    logs: LogPolicy,
) -> Result<ResultNode, SyncError> {
    let mut children = Vec::with_capacity(result.sub_runs.len());
    for run in &result.sub_runs {
        children.push(describe(server, None, run, logs)?);
    }
    let wants_log = match (result.status, logs) {
        (BuildStatus::Pending, _) => false,
        (BuildStatus::Terminal(_), LogPolicy::Always) => true,
        (BuildStatus::Terminal(outcome), LogPolicy::FailuresOnly) => !outcome.is_success(),
    };
    let log = if wants_log && children.is_empty() {
        Some(server.build_log(&result.location)?)
    } else {
        None
    };
    Ok(ResultNode {
        name: name.to_string(),
        location: result.location.clone(),
        status: result.status,
        log,
        children,
    })
}

/// Fetch the build at `location` and build its presentation tree. Without a
/// `name`, the server's display name (or the location) is used.
pub fn describe<S: JobServer + ?Sized>(
    server: &S,
    name: Option<&str>,
    location: &BuildLocation,
    logs: LogPolicy,
) -> Result<ResultNode, SyncError> {
    let info = server.build_info(location)?;
    let name = name
        .map(str::to_string)
        .or(info.display_name)
        .unwrap_or_else(|| location.to_string());
    let result = BuildResult {
        location: location.clone(),
        status: info.status,
        sub_runs: info.runs,
    };
    describe_result(server, &name, &result, logs)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use skipper_remote::fakes::{FakeServer, QueueStep, FAKE_ORIGIN};
    use skipper_remote::{BuildInfo, Outcome};

    use crate::schedule::ManualScheduler;
    use crate::test_support::names;

    use super::*;

    fn url(path: &str) -> String {
        format!("{FAKE_ORIGIN}/{path}")
    }

    #[test]
    fn resolved_and_vanished_queue_items() {
        let server = FakeServer::new();
        server.script_queue("a", vec![QueueStep::Queued, QueueStep::Ready(url("job/a/5/"))]);
        server.script_queue("b", vec![QueueStep::NotFound]);
        server.script_build(
            &url("job/a/5/"),
            vec![BuildInfo::pending(), BuildInfo::finished(Outcome::Success)],
        );
        let mut scheduler = ManualScheduler::new();

        let builds = BuildOrchestrator::new(&server, PollPolicy::default())
            .run(&names(&["a", "b"]), &[], &mut scheduler)
            .unwrap();

        assert_eq!(builds[0].job, "a");
        assert_eq!(
            builds[0].outcome,
            BuildOutcome::Finished(BuildResult {
                location: BuildLocation(url("job/a/5/")),
                status: BuildStatus::Terminal(Outcome::Success),
                sub_runs: vec![],
            })
        );
        assert_eq!(builds[1].job, "b");
        assert_eq!(builds[1].outcome, BuildOutcome::Unknown);
        // One sleep after the first queue sweep, one after the first build sweep.
        assert_eq!(scheduler.sleeps(), &[Duration::from_secs(1), Duration::from_secs(1)]);
    }

    #[test]
    fn results_keep_request_order() {
        let server = FakeServer::new();
        server.script_queue("slow", vec![QueueStep::Queued, QueueStep::Queued, QueueStep::Ready(url("s/1/"))]);
        server.script_queue("fast", vec![QueueStep::Ready(url("f/1/"))]);
        server.script_build(&url("f/1/"), vec![BuildInfo::finished(Outcome::Failure)]);
        let builds = BuildOrchestrator::new(&server, PollPolicy::default())
            .run(&names(&["slow", "fast"]), &[], &mut ManualScheduler::new())
            .unwrap();
        let order: Vec<&str> = builds.iter().map(|b| b.job.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast"]);
        assert!(builds[0].outcome.is_success());
        assert!(!builds[1].outcome.is_success());
    }

    #[test]
    fn cancelled_item_is_unknown() {
        let server = FakeServer::new();
        server.script_queue("a", vec![QueueStep::Cancelled]);
        let mut scheduler = ManualScheduler::new();
        let builds = BuildOrchestrator::new(&server, PollPolicy::default())
            .run(&names(&["a"]), &[], &mut scheduler)
            .unwrap();
        assert_eq!(builds[0].outcome, BuildOutcome::Unknown);
        assert!(scheduler.sleeps().is_empty());
    }

    #[test]
    fn max_wait_times_out_remaining_jobs() {
        let server = FakeServer::new();
        server.script_queue("stuck", vec![QueueStep::Queued]);
        server.script_queue("long", vec![QueueStep::Ready(url("l/1/"))]);
        server.script_build(&url("l/1/"), vec![BuildInfo::pending()]);
        let policy = PollPolicy::default().with_max_wait(Some(Duration::from_secs(3)));
        let mut scheduler = ManualScheduler::new();

        let builds = BuildOrchestrator::new(&server, policy)
            .run(&names(&["stuck", "long"]), &[], &mut scheduler)
            .unwrap();

        assert_eq!(builds[0].outcome, BuildOutcome::TimedOut { last_location: None });
        assert_eq!(
            builds[1].outcome,
            BuildOutcome::TimedOut {
                last_location: Some(BuildLocation(url("l/1/")))
            }
        );
        assert!(scheduler.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn parameters_are_passed_to_every_trigger() {
        let server = FakeServer::new();
        let params = vec![("BRANCH".to_string(), "dev".to_string())];
        BuildOrchestrator::new(&server, PollPolicy::default())
            .trigger(&names(&["a", "b"]), &params)
            .unwrap();
        let triggers: Vec<_> = server
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                skipper_remote::fakes::FakeCall::Trigger(job, p) => Some((job, p)),
                _ => None,
            })
            .collect();
        assert_eq!(
            triggers,
            vec![("a".to_string(), params.clone()), ("b".to_string(), params.clone())]
        );
    }

    #[test]
    fn pending_matrix_build_nests_its_runs() {
        let server = FakeServer::new();
        let parent = url("job/m/3/");
        let runs = vec![
            BuildLocation(url("job/m/os=linux/3/")),
            BuildLocation(url("job/m/os=mac/3/")),
        ];
        server.script_build(&parent, vec![BuildInfo::pending().with_runs(runs.clone())]);
        server.script_build(
            &runs[0].0,
            vec![BuildInfo::finished(Outcome::Success).with_display_name("m » linux #3")],
        );
        server.script_build(
            &runs[1].0,
            vec![BuildInfo::finished(Outcome::Failure).with_display_name("m » mac #3")],
        );
        server.set_log(&runs[1].0, "error: linker failed\n");

        let node = describe(&server, Some("m"), &BuildLocation(parent), LogPolicy::FailuresOnly).unwrap();

        assert_eq!(node.status_label(), "in progress");
        assert!(node.log.is_none());
        let children: Vec<(&str, String)> = node
            .children
            .iter()
            .map(|c| (c.name.as_str(), c.status_label()))
            .collect();
        assert_eq!(
            children,
            vec![("m » linux #3", "success".to_string()), ("m » mac #3", "failure".to_string())]
        );
        assert!(node.children[0].log.is_none());
        assert_eq!(node.children[1].log.as_deref(), Some("error: linker failed\n"));
    }

    #[test]
    fn verbose_logs_include_successes() {
        let server = FakeServer::new();
        let location = BuildLocation(url("job/a/1/"));
        server.set_log(&location.0, "ok\n");
        let result = BuildResult {
            location: location.clone(),
            status: BuildStatus::Terminal(Outcome::Success),
            sub_runs: vec![],
        };
        let quiet = describe_result(&server, "a", &result, LogPolicy::FailuresOnly).unwrap();
        assert!(quiet.log.is_none());
        let verbose = describe_result(&server, "a", &result, LogPolicy::Always).unwrap();
        assert_eq!(verbose.log.as_deref(), Some("ok\n"));
    }
}
