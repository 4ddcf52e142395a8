//! Skipper core library: job definitions, repository loading, configuration.
//!
//! - [`types`]: job definitions, pipeline relationships, link types
//! - [`context`]: dotted-path contexts and deep merging
//! - [`config`]: `skipper.yaml` server and policy settings
//! - [`repository`]: on-disk repository layout and loaders
//! - [`error`]: [`RepoError`]

pub mod config;
pub mod context;
pub mod error;
pub mod repository;
pub mod types;

pub use config::{RepoConfig, ServerConfig};
pub use context::Context;
pub use error::RepoError;
pub use types::{JobDefinition, JobName, JobSet, LinkType, PipelineInfo, PipelineMap};
