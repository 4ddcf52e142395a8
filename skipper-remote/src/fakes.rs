//! In-memory [`JobServer`] for tests.
//!
//! `FakeServer` stores job configurations keyed by name, derives each job's
//! type from the root element of its configuration, and plays back scripted
//! queue and build progressions. Every call is recorded in a call log.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::RemoteError;
use crate::server::{BuildInfo, BuildLocation, JobServer, Outcome, QueueHandle, QueueStatus};

/// Location prefix of every fake URL.
pub const FAKE_ORIGIN: &str = "http://fake.ci";

/// One scripted answer to a queue poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStep {
    Queued,
    Ready(String),
    NotFound,
    Cancelled,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    GetConfig(String),
    PushConfig(String),
    Delete(String),
    Trigger(String, Vec<(String, String)>),
    Queue(String),
    BuildInfo(String),
    BuildLog(String),
}

#[derive(Debug)]
struct FakeJob {
    kind: String,
    config: String,
    builds: u32,
}

#[derive(Debug)]
struct QueueItem {
    job: String,
    number: u32,
    steps: VecDeque<QueueStep>,
}

#[derive(Debug, Default)]
struct State {
    jobs: BTreeMap<String, FakeJob>,
    queue_scripts: HashMap<String, VecDeque<QueueStep>>,
    queue: HashMap<String, QueueItem>,
    builds: HashMap<String, VecDeque<BuildInfo>>,
    logs: HashMap<String, String>,
    unreachable: bool,
    next_queue_id: u32,
    calls: Vec<FakeCall>,
}

/// Scripted in-memory CI server.
#[derive(Debug, Default)]
pub struct FakeServer {
    state: Mutex<State>,
}

/// Job type of a configuration: the name of its root element.
pub fn config_kind(config: &str) -> String {
    let mut rest = config;
    while let Some(start) = rest.find('<') {
        let tag = &rest[start + 1..];
        if tag.starts_with('?') || tag.starts_with('!') {
            rest = tag;
            continue;
        }
        let end = tag
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(tag.len());
        return tag[..end].to_string();
    }
    String::new()
}

fn build_url(job: &str, number: u32) -> String {
    format!("{FAKE_ORIGIN}/job/{job}/{number}/")
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `job` with `config` as if it had been pushed earlier.
    pub fn add_job(&self, job: &str, config: &str) {
        let mut state = self.state.lock().unwrap();
        state.jobs.insert(
            job.to_string(),
            FakeJob {
                kind: config_kind(config),
                config: config.to_string(),
                builds: 0,
            },
        );
    }

    /// Stored configuration of `job`, if any.
    pub fn job_config(&self, job: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.jobs.get(job).map(|j| j.config.clone())
    }

    /// Names of all jobs on the server.
    pub fn job_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.jobs.keys().cloned().collect()
    }

    /// Answers for the queue item created by the next trigger of `job`.
    /// The last step repeats once the script runs out.
    pub fn script_queue(&self, job: &str, steps: Vec<QueueStep>) {
        let mut state = self.state.lock().unwrap();
        state
            .queue_scripts
            .insert(job.to_string(), steps.into_iter().collect());
    }

    /// Answers for build info at `location`; the last one repeats.
    pub fn script_build(&self, location: &str, infos: Vec<BuildInfo>) {
        let mut state = self.state.lock().unwrap();
        state
            .builds
            .insert(location.to_string(), infos.into_iter().collect());
    }

    pub fn set_log(&self, location: &str, log: &str) {
        let mut state = self.state.lock().unwrap();
        state.logs.insert(location.to_string(), log.to_string());
    }

    /// Make every subsequent call fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Jobs whose configuration was pushed, in push order.
    pub fn pushed_jobs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FakeCall::PushConfig(job) => Some(job),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: FakeCall) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let url = format!("{call:?}");
        state.calls.push(call);
        if state.unreachable {
            return Err(RemoteError::Transport {
                url,
                message: "connection refused".to_string(),
            });
        }
        Ok(state)
    }
}

impl JobServer for FakeServer {
    fn get_job_config(&self, job: &str) -> Result<String, RemoteError> {
        let state = self.record(FakeCall::GetConfig(job.to_string()))?;
        state
            .jobs
            .get(job)
            .map(|j| j.config.clone())
            .ok_or_else(|| RemoteError::JobNotFound {
                job: job.to_string(),
            })
    }

    fn push_job_config(&self, job: &str, config: &str) -> Result<(), RemoteError> {
        let mut state = self.record(FakeCall::PushConfig(job.to_string()))?;
        let kind = config_kind(config);
        match state.jobs.get_mut(job) {
            Some(existing) if existing.kind != kind => Err(RemoteError::TypeMismatch {
                job: job.to_string(),
                expected: existing.kind.clone(),
                actual: kind,
            }),
            Some(existing) => {
                existing.config = config.to_string();
                Ok(())
            }
            None => {
                state.jobs.insert(
                    job.to_string(),
                    FakeJob {
                        kind,
                        config: config.to_string(),
                        builds: 0,
                    },
                );
                Ok(())
            }
        }
    }

    fn delete_job(&self, job: &str) -> Result<(), RemoteError> {
        let mut state = self.record(FakeCall::Delete(job.to_string()))?;
        state
            .jobs
            .remove(job)
            .map(|_| ())
            .ok_or_else(|| RemoteError::JobNotFound {
                job: job.to_string(),
            })
    }

    fn trigger_build(
        &self,
        job: &str,
        parameters: &[(String, String)],
    ) -> Result<QueueHandle, RemoteError> {
        let mut state = self.record(FakeCall::Trigger(job.to_string(), parameters.to_vec()))?;
        state.next_queue_id += 1;
        let id = state.next_queue_id;
        let number = match state.jobs.get_mut(job) {
            Some(existing) => {
                existing.builds += 1;
                existing.builds
            }
            None => id,
        };
        let steps = state.queue_scripts.remove(job).unwrap_or_default();
        let handle = format!("{FAKE_ORIGIN}/queue/item/{id}/");
        state.queue.insert(
            handle.clone(),
            QueueItem {
                job: job.to_string(),
                number,
                steps,
            },
        );
        Ok(QueueHandle(handle))
    }

    fn queue_item(&self, handle: &QueueHandle) -> Result<QueueStatus, RemoteError> {
        let mut state = self.record(FakeCall::Queue(handle.0.clone()))?;
        let not_found = || RemoteError::QueueItemNotFound {
            handle: handle.0.clone(),
        };
        let item = state.queue.get_mut(&handle.0).ok_or_else(not_found)?;
        let step = if item.steps.len() > 1 {
            item.steps.pop_front()
        } else {
            item.steps.front().cloned()
        };
        match step {
            None => Ok(QueueStatus::Ready(BuildLocation(build_url(&item.job, item.number)))),
            Some(QueueStep::Queued) => Ok(QueueStatus::Queued),
            Some(QueueStep::Cancelled) => Ok(QueueStatus::Cancelled),
            Some(QueueStep::Ready(location)) => Ok(QueueStatus::Ready(BuildLocation(location))),
            Some(QueueStep::NotFound) => {
                state.queue.remove(&handle.0);
                Err(not_found())
            }
        }
    }

    fn build_info(&self, location: &BuildLocation) -> Result<BuildInfo, RemoteError> {
        let mut state = self.record(FakeCall::BuildInfo(location.0.clone()))?;
        let info = match state.builds.get_mut(&location.0) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(info.unwrap_or_else(|| BuildInfo::finished(Outcome::Success)))
    }

    fn build_log(&self, location: &BuildLocation) -> Result<String, RemoteError> {
        let state = self.record(FakeCall::BuildLog(location.0.clone()))?;
        Ok(state.logs.get(&location.0).cloned().unwrap_or_default())
    }
}
