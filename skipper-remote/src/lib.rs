//! # skipper-remote
//!
//! Boundary to the CI server. Everything the engine needs from the server
//! goes through the [`JobServer`] trait:
//!
//! - [`JenkinsClient`]: blocking HTTP implementation over `ureq`
//! - [`fakes::FakeServer`]: scripted in-memory implementation for tests

pub mod error;
pub mod fakes;
pub mod jenkins;
pub mod server;

pub use error::RemoteError;
pub use jenkins::JenkinsClient;
pub use server::{BuildInfo, BuildLocation, BuildStatus, JobServer, Outcome, QueueHandle, QueueStatus};
